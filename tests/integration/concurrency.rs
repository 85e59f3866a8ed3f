//! Concurrent access to a shared orchestrator.

use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use std::thread;

use distcalc::core::{ExpressionStatus, TaskStatus};

use crate::fixtures::{orchestrator, work_one};

const THREADS: usize = 8;

#[test]
fn test_concurrent_submissions_get_distinct_ids() {
    let orch = orchestrator();

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let orch = Arc::clone(&orch);
            thread::spawn(move || {
                (0..25)
                    .map(|i| orch.submit(&format!("{}+{}", t, i)).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    let mut ids = HashSet::new();
    for handle in handles {
        for id in handle.join().unwrap() {
            assert!(ids.insert(id), "duplicate expression id {}", id);
        }
    }
    assert_eq!(ids.len(), THREADS * 25);
    assert_eq!(orch.expressions().len(), THREADS * 25);
}

#[test]
fn test_concurrent_workers_never_share_a_task() {
    let orch = orchestrator();
    let ids: Vec<_> = (0..40)
        .map(|i| orch.submit(&format!("({}+1)*({}-1)/2", i, i)).unwrap())
        .collect();

    let dispatched = Arc::new(Mutex::new(Vec::new()));
    let handles: Vec<_> = (0..THREADS)
        .map(|_| {
            let orch = Arc::clone(&orch);
            let dispatched = Arc::clone(&dispatched);
            thread::spawn(move || {
                // Keep polling until every expression resolved.
                while orch
                    .expressions()
                    .iter()
                    .any(|e| !e.status.is_terminal())
                {
                    let Some(task) = orch.next_task() else {
                        thread::yield_now();
                        continue;
                    };
                    for dep in &task.dependencies {
                        let dep = orch.store().get_task(dep).unwrap();
                        assert_eq!(dep.status, TaskStatus::Completed);
                    }
                    dispatched.lock().unwrap().push(task.id);

                    let (a, b) = task.operand_values().unwrap();
                    let value = task.operation.apply(a, b).unwrap();
                    orch.submit_result(&task.id, value).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let dispatched = dispatched.lock().unwrap();
    let unique: HashSet<_> = dispatched.iter().collect();
    assert_eq!(unique.len(), dispatched.len(), "a task was dispatched twice");
    // Four operators per expression.
    assert_eq!(dispatched.len(), 40 * 4);

    for (i, id) in ids.iter().enumerate() {
        let expr = orch.expression(id).unwrap();
        let expected = ((i as f64) + 1.0) * ((i as f64) - 1.0) / 2.0;
        assert_eq!(expr.status, ExpressionStatus::Completed);
        assert_eq!(expr.result, Some(expected));
    }
}

#[test]
fn test_reports_racing_with_submissions() {
    let orch = orchestrator();
    for i in 0..20 {
        orch.submit(&format!("{}*2+1", i)).unwrap();
    }

    let submitter = {
        let orch = Arc::clone(&orch);
        thread::spawn(move || {
            for i in 20..40 {
                orch.submit(&format!("{}*2+1", i)).unwrap();
            }
        })
    };
    let workers: Vec<_> = (0..4)
        .map(|_| {
            let orch = Arc::clone(&orch);
            thread::spawn(move || {
                let mut idle = 0;
                while idle < 1000 {
                    if work_one(&orch) {
                        idle = 0;
                    } else {
                        idle += 1;
                        thread::yield_now();
                    }
                }
            })
        })
        .collect();

    submitter.join().unwrap();
    for worker in workers {
        worker.join().unwrap();
    }
    // Anything left after the workers went idle.
    while work_one(&orch) {}

    let mut results: Vec<f64> = orch
        .expressions()
        .iter()
        .map(|e| {
            assert_eq!(e.status, ExpressionStatus::Completed, "{}", e.expression);
            e.result.unwrap()
        })
        .collect();
    results.sort_by(f64::total_cmp);
    let expected: Vec<f64> = (0..40).map(|i| (i * 2 + 1) as f64).collect();
    assert_eq!(results, expected);
}
