//! Job equality.

use job_core::JobDescriptor;

/// Whether `a` and `b` describe the same unit of work.
///
/// Same declaring type, same method name and pairwise equal arguments in
/// order. The queue is not compared; queue sensitivity comes from which
/// pools are scanned.
pub fn jobs_equal(a: &JobDescriptor, b: &JobDescriptor) -> bool {
    if a.type_name != b.type_name || a.method != b.method || a.args.len() != b.args.len() {
        return false;
    }

    a.args.iter().zip(&b.args).all(|(left, right)| left == right)
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    fn job(args: Vec<Value>) -> JobDescriptor {
        JobDescriptor::new("Reports", "Generate").with_args(args)
    }

    #[test]
    fn equal_when_identity_and_args_match() {
        assert!(jobs_equal(&job(vec![]), &job(vec![])));
        assert!(jobs_equal(
            &job(vec![json!(42), json!("eu"), Value::Null]),
            &job(vec![json!(42), json!("eu"), Value::Null]),
        ));
    }

    #[test]
    fn queue_is_ignored() {
        let a = job(vec![json!(1)]).on_queue("critical");
        let b = job(vec![json!(1)]);
        assert!(jobs_equal(&a, &b));
    }

    #[test]
    fn differs_on_identity_or_arity() {
        let base = job(vec![json!(1)]);
        assert!(!jobs_equal(
            &base,
            &JobDescriptor::new("Invoices", "Generate").with_arg(1)
        ));
        assert!(!jobs_equal(
            &base,
            &JobDescriptor::new("Reports", "Archive").with_arg(1)
        ));
        assert!(!jobs_equal(&base, &job(vec![json!(1), json!(2)])));
    }

    #[test]
    fn argument_order_and_absence_matter() {
        assert!(!jobs_equal(
            &job(vec![json!(1), json!(2)]),
            &job(vec![json!(2), json!(1)])
        ));
        assert!(!jobs_equal(&job(vec![Value::Null]), &job(vec![json!(0)])));
        assert!(!jobs_equal(&job(vec![json!(0)]), &job(vec![Value::Null])));
        assert!(!jobs_equal(&job(vec![json!("1")]), &job(vec![json!(1)])));
    }

    #[test]
    fn structured_arguments_compare_by_value() {
        let a = job(vec![json!({"id": 7, "tags": ["a", "b"]})]);
        let b = job(vec![json!({"tags": ["a", "b"], "id": 7})]);
        let c = job(vec![json!({"id": 7, "tags": ["b", "a"]})]);
        assert!(jobs_equal(&a, &b));
        assert!(!jobs_equal(&a, &c));
    }
}
