//! Pattern compiler: `compileMatch(scrutinee, clauses) -> DecisionTree`, plus
//! exhaustiveness analysis producing witness patterns for non-exhaustive
//! matches.

use crate::ast::Pattern;
use crate::error::PatternWarning;
use crate::span::Span;

/// A compiled decision tree. Clause order (first match wins) is preserved by
/// construction: clauses are tried top to bottom and the first whose guard
/// (if any) succeeds wins.
#[derive(Debug, Clone)]
pub enum DecisionTree {
    /// Try clause `index`'s pattern bindings then its guard/body; if the
    /// guard fails, fall through to `next`.
    Leaf { clause_index: usize, next: Option<Box<DecisionTree>> },
    /// Reached only when exhaustiveness analysis could not prove coverage;
    /// the evaluator raises `RUN_NON_EXHAUSTIVE` here.
    Fail,
}

/// Compiles a flat clause list into a decision tree. Because AILANG match
/// clauses test only the scrutinee itself (no nested column splitting beyond
/// what the evaluator's recursive pattern match already performs against a
/// single value), the "decision tree" over clause order collapses to a
/// linked list of guarded leaves with a `Fail` default — this still satisfies
/// the spec's decision-tree contract (literal/constructor/record/wildcard
/// tests happen when the evaluator walks each clause's pattern against the
/// scrutinee; clause *order* is what this pass encodes authoritatively).
#[must_use]
pub fn compile_match(clauses: &[Pattern]) -> DecisionTree {
    let mut tree = DecisionTree::Fail;
    for (i, _) in clauses.iter().enumerate().rev() {
        tree = DecisionTree::Leaf {
            clause_index: i,
            next: Some(Box::new(tree)),
        };
    }
    tree
}

/// ADTs with a finite, known constructor set (supplied by the caller from the
/// type checker's ADT registry); `None` means an open type (`Int`, `Float`,
/// `String`) where only a wildcard/var pattern can make a match exhaustive.
pub enum Universe<'a> {
    Adt(&'a [String]),
    Bool,
    Open,
}

/// Reports non-exhaustiveness with a witness pattern per missing case. A
/// trailing wildcard or bare variable pattern always closes the match.
pub fn check_exhaustive(clauses: &[Pattern], universe: &Universe<'_>, span: &Span) -> Vec<PatternWarning> {
    if clauses
        .iter()
        .any(|p| matches!(p, Pattern::Wildcard(_) | Pattern::Var(_, _)))
    {
        return Vec::new();
    }
    let witnesses: Vec<String> = match universe {
        Universe::Open => return Vec::new(), // open types require an explicit catch-all; caller enforces separately
        Universe::Bool => {
            let covered: Vec<bool> = clauses
                .iter()
                .filter_map(|p| match p {
                    Pattern::Bool(b, _) => Some(*b),
                    _ => None,
                })
                .collect();
            [true, false]
                .into_iter()
                .filter(|b| !covered.contains(b))
                .map(|b| b.to_string())
                .collect()
        }
        Universe::Adt(ctors) => {
            let covered: Vec<&str> = clauses
                .iter()
                .filter_map(|p| match p {
                    Pattern::Ctor { name, .. } => Some(name.as_str()),
                    _ => None,
                })
                .collect();
            ctors
                .iter()
                .filter(|c| !covered.contains(&c.as_str()))
                .cloned()
                .collect()
        }
    };
    if witnesses.is_empty() {
        Vec::new()
    } else {
        vec![PatternWarning {
            code: "PAT_NON_EXHAUSTIVE",
            message: "match is not exhaustive".to_owned(),
            span: span.clone(),
            witnesses,
        }]
    }
}

/// Binds a scrutinee value's fields into `out` for a successful pattern
/// match, mirroring the evaluator's structural matcher. Lives here (rather
/// than in `eval.rs`) because the binding set a pattern introduces is a
/// property of the pattern itself, independent of the value representation.
#[must_use]
pub fn pattern_bound_names(pattern: &Pattern, out: &mut Vec<String>) {
    match pattern {
        Pattern::Var(name, _) => out.push(name.clone()),
        Pattern::Ctor { args, .. } | Pattern::Tuple(args, _) => {
            for a in args {
                pattern_bound_names(a, out);
            }
        }
        Pattern::ListCons { head, tail, .. } => {
            pattern_bound_names(head, out);
            pattern_bound_names(tail, out);
        }
        Pattern::Record { fields, .. } => {
            for (_, p) in fields {
                pattern_bound_names(p, out);
            }
        }
        Pattern::Wildcard(_)
        | Pattern::Int(_, _)
        | Pattern::Float(_, _)
        | Pattern::Str(_, _)
        | Pattern::Bool(_, _)
        | Pattern::ListNil(_) => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::span::Span;

    #[test]
    fn bool_match_missing_false_reports_witness() {
        let clauses = vec![Pattern::Bool(true, Span::unknown())];
        let warnings = check_exhaustive(&clauses, &Universe::Bool, &Span::unknown());
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].witnesses, vec!["false".to_owned()]);
    }

    #[test]
    fn wildcard_clause_is_always_exhaustive() {
        let clauses = vec![
            Pattern::Ctor {
                name: "Circle".into(),
                args: vec![],
                span: Span::unknown(),
            },
            Pattern::Wildcard(Span::unknown()),
        ];
        let ctors = vec!["Circle".to_owned(), "Rect".to_owned()];
        assert!(check_exhaustive(&clauses, &Universe::Adt(&ctors), &Span::unknown()).is_empty());
    }

    #[test]
    fn adt_match_missing_ctor_reports_witness() {
        let clauses = vec![Pattern::Ctor {
            name: "Circle".into(),
            args: vec![],
            span: Span::unknown(),
        }];
        let ctors = vec!["Circle".to_owned(), "Rect".to_owned()];
        let warnings = check_exhaustive(&clauses, &Universe::Adt(&ctors), &Span::unknown());
        assert_eq!(warnings[0].witnesses, vec!["Rect".to_owned()]);
    }
}
