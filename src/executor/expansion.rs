//! Fan-out of list-valued arguments.
//!
//! A literal argument holding an array is treated as one value per expanded
//! call; scalar literals and cache references are repeated for every call.
//! All list-valued arguments of a procedure must have the same length.

use super::error::ExecutorError;
use super::run_spec::{ProcInit, RunSpec};
use crate::store::{ArgumentBinding, ArgumentSource};
use serde_json::Value;

/// Expands one call into as many calls as its list-valued arguments have
/// elements. A call without list-valued arguments is returned unchanged.
pub fn expand_proc(init: &ProcInit) -> Result<Vec<ProcInit>, ExecutorError> {
    let Some(count) = expansion_len(init)? else {
        return Ok(vec![init.clone()]);
    };
    Ok((0..count)
        .map(|index| {
            let arguments = init
                .arguments
                .iter()
                .map(|binding| match &binding.source {
                    ArgumentSource::Literal(Value::Array(items)) => {
                        ArgumentBinding::literal(binding.name.clone(), items[index].clone())
                    }
                    _ => binding.clone(),
                })
                .collect();
            ProcInit::new(init.proc_name.clone(), arguments)
        })
        .collect())
}

fn expansion_len(init: &ProcInit) -> Result<Option<usize>, ExecutorError> {
    let mut expected: Option<usize> = None;
    for binding in &init.arguments {
        let ArgumentSource::Literal(Value::Array(items)) = &binding.source else {
            continue;
        };
        if items.is_empty() {
            return Err(ExecutorError::ExpansionEmpty {
                proc_name: init.proc_name.clone(),
                argument: binding.name.clone(),
            });
        }
        match expected {
            None => expected = Some(items.len()),
            Some(len) if len != items.len() => {
                return Err(ExecutorError::ExpansionLength {
                    proc_name: init.proc_name.clone(),
                    argument: binding.name.clone(),
                    expected: len,
                    actual: items.len(),
                });
            }
            Some(_) => {}
        }
    }
    Ok(expected)
}

impl RunSpec {
    /// One run whose steps are every call expanded in place.
    pub fn expand_steps(&self) -> Result<RunSpec, ExecutorError> {
        let mut proc_inits = Vec::new();
        for init in &self.proc_inits {
            proc_inits.extend(expand_proc(init)?);
        }
        let mut expanded = RunSpec {
            description: self.description.clone(),
            environment_name: self.environment_name.clone(),
            proc_inits,
        };
        expanded.normalize();
        Ok(expanded)
    }

    /// One run per element of the list-valued arguments. Calls without lists
    /// appear unchanged in every run; calls with lists must all agree on the
    /// number of runs.
    pub fn expand_runs(&self) -> Result<Vec<RunSpec>, ExecutorError> {
        let mut expanded = Vec::with_capacity(self.proc_inits.len());
        let mut run_count: Option<(usize, &str)> = None;
        for init in &self.proc_inits {
            let calls = expand_proc(init)?;
            if expansion_len(init)?.is_some() {
                match run_count {
                    None => run_count = Some((calls.len(), init.proc_name.as_str())),
                    Some((count, first)) if count != calls.len() => {
                        return Err(ExecutorError::ExpansionLength {
                            proc_name: init.proc_name.clone(),
                            argument: format!("(runs of `{first}`)"),
                            expected: count,
                            actual: calls.len(),
                        });
                    }
                    Some(_) => {}
                }
            }
            expanded.push(calls);
        }

        let count = run_count.map(|(count, _)| count).unwrap_or(1);
        Ok((0..count)
            .map(|index| {
                let mut spec = RunSpec {
                    description: self.description.clone(),
                    environment_name: self.environment_name.clone(),
                    proc_inits: expanded
                        .iter()
                        .map(|calls| calls.get(index).unwrap_or(&calls[0]).clone())
                        .collect(),
                };
                spec.normalize();
                spec
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn scalars_broadcast_across_expanded_calls() {
        let init = ProcInit::new(
            "train",
            vec![
                ArgumentBinding::literal("n_estimators", json!([10, 20, 30])),
                ArgumentBinding::literal("seed", 1),
                ArgumentBinding::from_cache("X", "X.csv"),
            ],
        );
        let calls = expand_proc(&init).expect("expand");
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[1].arguments_str, "n_estimators:20, seed:1, X:cache(X.csv)");
    }

    #[test]
    fn unequal_list_lengths_are_rejected() {
        let init = ProcInit::new(
            "foo",
            vec![
                ArgumentBinding::literal("a", json!([1, 2])),
                ArgumentBinding::literal("b", json!([1, 2, 3])),
            ],
        );
        let err = expand_proc(&init).expect_err("length mismatch");
        assert!(matches!(
            err,
            ExecutorError::ExpansionLength {
                expected: 2,
                actual: 3,
                ..
            }
        ));
    }

    #[test]
    fn expand_steps_renumbers_steps() {
        let spec = RunSpec::new("sweep")
            .step("load", vec![])
            .step("foo", vec![ArgumentBinding::literal("a", json!([1, 2]))]);
        let expanded = spec.expand_steps().expect("expand");
        let orders = expanded
            .proc_inits
            .iter()
            .map(|init| init.run_order)
            .collect::<Vec<_>>();
        assert_eq!(orders, vec![Some(0), Some(1), Some(2)]);
    }

    #[test]
    fn expand_runs_repeats_plain_calls_in_each_run() {
        let spec = RunSpec::new("sweep")
            .step("load", vec![])
            .step("foo", vec![ArgumentBinding::literal("a", json!([1, 2]))]);
        let runs = spec.expand_runs().expect("expand");
        assert_eq!(runs.len(), 2);
        assert_eq!(runs[1].proc_inits[0].proc_name, "load");
        assert_eq!(
            runs[1].proc_inits[1].arguments,
            vec![ArgumentBinding::literal("a", 2)]
        );
    }
}
