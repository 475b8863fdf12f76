//! Relationship-based access control scenarios
//!
//! Each test mirrors a policy shape seen in practice: direct ownership,
//! access through a friend, group hierarchies, and deny lists expressed
//! with negation.

use super::{ask, evaluate};

#[test]
fn test_ownership_access() {
    let model = evaluate(
        r#"
        github_user(alice).
        repo(r1).
        owner_of(alice, r1).
        access(X, Y) :- github_user(X), repo(Y), owner_of(X, Y).
        "#,
    );

    assert!(ask(&model, "access(alice, r1)"));
    assert!(!ask(&model, "access(bob, r1)"));
}

#[test]
fn test_transitive_friend_access() {
    let model = evaluate(
        r#"
        user(alice). user(bob). photo(p1).
        friend_of(alice, bob).
        owner_of(bob, p1).
        access(X, Z) :- user(X), photo(Z), friend_of(X, Y), owner_of(Y, Z).
        "#,
    );

    assert!(ask(&model, "access(alice, p1)"));
    assert!(!ask(&model, "access(bob, p1)"));
}

#[test]
fn test_recursive_friend_chain() {
    let model = evaluate(
        r#"
        friend_of(alice, bob).
        friend_of(bob, carol).
        friend_of(carol, dave).
        owner_of(dave, p1).
        reaches(X, Y) :- friend_of(X, Y).
        reaches(X, Z) :- friend_of(X, Y), reaches(Y, Z).
        access(X, P) :- reaches(X, O), owner_of(O, P).
        access(X, P) :- owner_of(X, P).
        "#,
    );

    for user in ["alice", "bob", "carol", "dave"] {
        assert!(ask(&model, &format!("access({}, p1)", user)), "{}", user);
    }
    assert!(!ask(&model, "access(erin, p1)"));
}

#[test]
fn test_group_hierarchy() {
    let model = evaluate(
        r#"
        member(alice, eng).
        subgroup(eng, staff).
        subgroup(staff, everyone).
        grant(everyone, "/wiki").
        grant(staff, "/payroll").
        in_group(U, G) :- member(U, G).
        in_group(U, G) :- in_group(U, S), subgroup(S, G).
        access(U, R) :- in_group(U, G), grant(G, R).
        "#,
    );

    assert!(ask(&model, r#"access(alice, "/wiki")"#));
    assert!(ask(&model, r#"access(alice, "/payroll")"#));
    assert!(!ask(&model, r#"access(alice, "/admin")"#));
}

#[test]
fn test_deny_list_with_negation() {
    let model = evaluate(
        r#"
        user(alice). user(bob). user(mallory).
        doc(d1).
        blocked(mallory).
        access(U, D) :- user(U), doc(D), not blocked(U).
        "#,
    );

    assert!(ask(&model, "access(alice, d1)"));
    assert!(ask(&model, "access(bob, d1)"));
    assert!(!ask(&model, "access(mallory, d1)"));
}

#[test]
fn test_negation_over_derived_relation() {
    let model = evaluate(
        r#"
        user(alice). user(bob). user(carol).
        follows(alice, bob).
        follows(bob, alice).
        mutual(X, Y) :- follows(X, Y), follows(Y, X).
        has_mutual(X) :- mutual(X, _).
        lonely(X) :- user(X), not has_mutual(X).
        "#,
    );

    assert!(ask(&model, "lonely(carol)"));
    assert!(!ask(&model, "lonely(alice)"));
    assert_eq!(model.stratification().len(), 2);
}

#[test]
fn test_equality_binds_only_identical_terms() {
    let model = evaluate(
        r#"
        pair(a, a). pair(a, b). pair(b, b).
        same(X, Y) :- pair(X, Y), X = Y.
        different(X, Y) :- pair(X, Y), X != Y.
        "#,
    );

    assert!(ask(&model, "same(a, a)"));
    assert!(ask(&model, "same(b, b)"));
    assert!(!ask(&model, "same(a, b)"));
    assert!(ask(&model, "different(a, b)"));
    assert!(!ask(&model, "different(a, a)"));
    assert_eq!(model.relation("same").map(|(_, r)| r.len()).sum::<usize>(), 2);
    assert_eq!(model.relation("different").map(|(_, r)| r.len()).sum::<usize>(), 1);
}

#[test]
fn test_comparison_with_constant() {
    let model = evaluate(
        r#"
        role(alice, admin). role(bob, viewer).
        resource(r1).
        access(U, R) :- role(U, Role), resource(R), Role = admin.
        "#,
    );

    assert!(ask(&model, "access(alice, r1)"));
    assert!(!ask(&model, "access(bob, r1)"));
}

#[test]
fn test_propositional_switch() {
    let model = evaluate(
        r#"
        user(alice).
        doc(d1).
        maintenance.
        access(U, D) :- user(U), doc(D), not maintenance.
        read_only(U) :- user(U), maintenance.
        "#,
    );

    assert!(!ask(&model, "access(alice, d1)"));
    assert!(ask(&model, "read_only(alice)"));
    assert!(ask(&model, "maintenance"));
}
