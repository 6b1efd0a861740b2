//! Domain-prefix canonicalization.
//!
//! Some producers put the routing token in front of the key name instead of
//! in a separator-delimited slot, which defeats the generic masking stages.
//! Those names are rewritten to `<convention>:<variable part>`.

/// A naming convention recognised by prefix or suffix.
#[derive(Debug, Clone, Copy)]
enum Convention {
    /// `<fixed><sep><variable...>`: fixed part comes first.
    Leading {
        prefix: &'static str,
        separator: char,
        fixed_parts: usize,
    },
    /// `<variable><sep><fixed...>`: routing token comes first.
    Trailing {
        suffix: &'static str,
        separator: char,
    },
}

/// Checked in order; the first match wins.
const CONVENTIONS: [Convention; 5] = [
    // task-queue result keys
    Convention::Leading {
        prefix: "celery-task-meta",
        separator: '-',
        fixed_parts: 3,
    },
    // aggregation-job keys
    Convention::Leading {
        prefix: "qo_cli.aff_aggregations.aggregate_aff_aname_aname",
        separator: '-',
        fixed_parts: 1,
    },
    Convention::Trailing {
        suffix: "_trigger_queue_user_job",
        separator: '_',
    },
    Convention::Trailing {
        suffix: ".reply.celery.pidbox",
        separator: '.',
    },
    Convention::Trailing {
        suffix: "_user_queue_user_job",
        separator: '_',
    },
];

impl Convention {
    fn rewrite(&self, name: &str) -> Option<String> {
        match *self {
            Convention::Leading {
                prefix,
                separator,
                fixed_parts,
            } => {
                if !name.starts_with(prefix) {
                    return None;
                }
                let parts: Vec<&str> = name.split(separator).collect();
                let split = fixed_parts.min(parts.len());
                let sep = separator.to_string();
                Some(format!(
                    "{}:{}",
                    parts[..split].join(&sep),
                    parts[split..].join(&sep)
                ))
            }
            Convention::Trailing { suffix, separator } => {
                if !name.ends_with(suffix) {
                    return None;
                }
                let (token, rest) = name.split_once(separator)?;
                Some(format!("{}:{}", rest, token))
            }
        }
    }
}

/// Rewrite `name` into canonical order, or return it unchanged.
pub fn canonicalize(name: &str) -> String {
    CONVENTIONS
        .iter()
        .find_map(|c| c.rewrite(name))
        .unwrap_or_else(|| name.to_string())
}
