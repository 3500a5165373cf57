//! Ordered prefix rules with longest-match lookup

/// What a rule assigns matching paths to
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Target {
    /// Every match goes to one named chunk
    Chunk(String),
    /// Each direct child of the prefix gets its own chunk
    SplitDirectory,
}

/// A single prefix rule
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rule {
    /// Normalized prefix, no leading `./` and no surrounding slashes
    pub prefix: String,
    pub target: Target,
    /// Name shown when explaining a decision (group name, rule prefix)
    pub label: String,
}

impl Rule {
    pub fn new(prefix: &str, target: Target, label: impl Into<String>) -> Self {
        Self {
            prefix: normalize_prefix(prefix),
            target,
            label: label.into(),
        }
    }
}

/// Result of a table lookup
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuleMatch<'r, 'p> {
    /// Declaration index of the winning rule
    pub index: usize,
    pub rule: &'r Rule,
    /// Length of the matched prefix, including the child segment of a split
    pub len: usize,
    /// Child segment below the prefix for split rules
    pub child: Option<&'p str>,
}

/// Rules in declaration order.
///
/// Lookup picks the longest matching prefix; equal lengths go to the rule
/// declared first. Prefixes only match whole path segments.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: Vec<Rule>,
}

impl RuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, rule: Rule) {
        self.rules.push(rule);
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Find the most specific rule for `path`
    pub fn lookup<'r, 'p>(&'r self, path: &'p str) -> Option<RuleMatch<'r, 'p>> {
        let mut best: Option<RuleMatch<'r, 'p>> = None;

        for (index, rule) in self.rules.iter().enumerate() {
            let Some(rest) = strip_segment_prefix(path, &rule.prefix) else {
                continue;
            };

            let (len, child) = match rule.target {
                Target::Chunk(_) => (rule.prefix.len(), None),
                Target::SplitDirectory => match rest.split('/').next() {
                    Some(child) if !child.is_empty() => {
                        (rule.prefix.len() + 1 + child.len(), Some(child))
                    }
                    _ => continue,
                },
            };

            // strictly longer, so the earlier rule keeps ties
            if best.as_ref().map_or(true, |b| len > b.len) {
                best = Some(RuleMatch {
                    index,
                    rule,
                    len,
                    child,
                });
            }
        }

        best
    }
}

/// Trim `./` and slashes from a configured prefix
pub fn normalize_prefix(prefix: &str) -> String {
    let prefix = prefix.replace('\\', "/");
    prefix
        .trim_start_matches("./")
        .trim_matches('/')
        .to_string()
}

/// Remainder of `path` after `prefix`, if `prefix` covers whole segments
fn strip_segment_prefix<'p>(path: &'p str, prefix: &str) -> Option<&'p str> {
    let rest = path.strip_prefix(prefix)?;
    if rest.is_empty() {
        Some(rest)
    } else {
        rest.strip_prefix('/')
    }
}
