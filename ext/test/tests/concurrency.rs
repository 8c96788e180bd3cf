//! Concurrent checks share one validator without leaking state between them.
//!
//! Run with: cargo test -p sieve-test --test concurrency

use std::sync::Barrier;
use std::thread;

use sieve_test::prelude::*;

const RULES: &str = r#"
types:
  Account:
    role:
      - values: [admin]
        group: staff
      - values: [guest]
        group: visitors
  Team:
    name:
      - values: [core]
        group: [staff, visitors]
"#;

fn account(role: &str, team: &str) -> Account {
    Account {
        role: Some(role.into()),
        team: Some(Box::new(Team {
            name: Some(team.into()),
            ..Team::default()
        })),
        ..Account::default()
    }
}

/// Two threads race the first check of each type, in different groups, and
/// each sees only its own failure.
#[test]
fn test_groups_do_not_leak_between_threads() {
    for _ in 0..50 {
        let validator = Validator::with_rule_book(RuleBook::from_yaml(RULES).unwrap());
        let barrier = Barrier::new(2);

        let (staff, visitors) = thread::scope(|s| {
            let staff = s.spawn(|| {
                barrier.wait();
                validator.evaluate("staff", &Value::object(&account("guest", "core")), None)
            });
            let visitors = s.spawn(|| {
                barrier.wait();
                validator.evaluate("visitors", &Value::object(&account("guest", "bogus")), None)
            });
            (staff.join().unwrap(), visitors.join().unwrap())
        });
        let (staff, visitors) = (staff.unwrap(), visitors.unwrap());

        assert!(!staff.is_pass());
        assert_eq!(staff.group(), "staff");
        assert_eq!(
            staff.err_msg(),
            Some(r#"Account.role: value "guest" is not accepted by values ["admin"]"#)
        );
        assert_eq!(staff.chain().len(), 1);

        assert!(!visitors.is_pass());
        assert_eq!(visitors.group(), "visitors");
        assert_eq!(
            visitors.err_msg(),
            Some(r#"Team.name: value "bogus" is not accepted by values ["core"]"#)
        );
        assert_eq!(visitors.chain().len(), 2);
        assert!(!visitors.err_msg_chain().contains("Account.role"));
        assert!(!staff.err_msg_chain().contains("Team.name"));

        // Each type was indexed and its rules registered once.
        assert_eq!(validator.index().len(), 2);
        assert_eq!(validator.registry().len(), 4);
    }
}

/// Many threads check a mix of passing and failing graphs at once.
#[test]
fn test_many_threads_same_group() {
    let validator = Validator::with_rule_book(RuleBook::from_yaml(RULES).unwrap());
    let threads = 8;
    let barrier = Barrier::new(threads);

    thread::scope(|s| {
        for t in 0..threads {
            let validator = &validator;
            let barrier = &barrier;
            s.spawn(move || {
                barrier.wait();
                for i in 0..200 {
                    let ok = (t + i) % 3 != 0;
                    let subject = account("admin", if ok { "core" } else { "bogus" });
                    let verdict = validator.evaluate("staff", &Value::object(&subject), None).unwrap();
                    assert_eq!(verdict.is_pass(), ok, "thread {t} iteration {i}");
                    if !ok {
                        assert_eq!(
                            verdict.err_msg_chain(),
                            r#"Account.team: nested Team failed --> Team.name: value "bogus" is not accepted by values ["core"]"#
                        );
                    }
                }
            });
        }
    });
}
