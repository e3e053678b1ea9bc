use kiu_core::{
    open_db_in_memory, AccessResolver, AccessStore, CategoryId, CategoryService, CategoryTree,
    GrantState, NewCategory, NewUser, RepoError, SqliteAccessStore, SqliteCategoryRepository,
    UserAccessService, UserId, UserRole,
};
use rusqlite::Connection;

struct Fixture {
    conn: Connection,
    user: UserId,
    main: CategoryId,
    sub: CategoryId,
    leaf: CategoryId,
}

fn fixture() -> Fixture {
    let conn = open_db_in_memory().unwrap();
    let user = UserAccessService::try_new(&conn)
        .unwrap()
        .register_user(&NewUser {
            kiu_id: "2024001".to_string(),
            name: "Amina".to_string(),
            whatsapp_number: Some("+256700000001".to_string()),
            role: UserRole::User,
        })
        .unwrap()
        .id;

    let categories = CategoryService::try_new(&conn).unwrap();
    let create = |title: &str, parent_id: Option<CategoryId>| {
        categories
            .create_category(&NewCategory {
                title: title.to_string(),
                image: None,
                parent_id,
                is_active: true,
            })
            .unwrap()
            .id
    };
    let main = create("Medicine", None);
    let sub = create("Anatomy", Some(main));
    let leaf = create("Upper Limb", Some(sub));
    drop(categories);

    Fixture {
        conn,
        user,
        main,
        sub,
        leaf,
    }
}

fn grant_only(conn: &Connection, user: UserId, allowed: &[CategoryId]) {
    UserAccessService::try_new(conn)
        .unwrap()
        .save_access_matrix(user, allowed)
        .unwrap();
}

fn can_access(conn: &Connection, user: UserId, category: CategoryId) -> bool {
    let tree = SqliteCategoryRepository::try_new(conn).unwrap();
    let store = SqliteAccessStore::try_new(conn).unwrap();
    AccessResolver::new(&tree, &store)
        .can_access(user, category)
        .unwrap()
}

#[test]
fn root_decision_equals_its_grant() {
    let fx = fixture();
    assert!(!can_access(&fx.conn, fx.user, fx.main));

    grant_only(&fx.conn, fx.user, &[fx.main]);
    assert!(can_access(&fx.conn, fx.user, fx.main));
    assert!(!can_access(&fx.conn, fx.user, fx.sub));
}

#[test]
fn nested_decision_is_grant_and_parent_decision_for_every_grant_combination() {
    let fx = fixture();
    let ids = [fx.main, fx.sub, fx.leaf];

    for mask in 0u8..8 {
        let allowed: Vec<CategoryId> = ids
            .iter()
            .enumerate()
            .filter(|(bit, _)| mask & (1 << bit) != 0)
            .map(|(_, id)| *id)
            .collect();
        grant_only(&fx.conn, fx.user, &allowed);

        let main = can_access(&fx.conn, fx.user, fx.main);
        let sub = can_access(&fx.conn, fx.user, fx.sub);
        let leaf = can_access(&fx.conn, fx.user, fx.leaf);

        assert_eq!(main, allowed.contains(&fx.main), "mask {mask}");
        assert_eq!(sub, allowed.contains(&fx.sub) && main, "mask {mask}");
        assert_eq!(leaf, allowed.contains(&fx.leaf) && sub, "mask {mask}");
    }
}

#[test]
fn leaf_grant_without_ancestors_is_denied() {
    let fx = fixture();
    grant_only(&fx.conn, fx.user, &[fx.leaf]);
    assert!(!can_access(&fx.conn, fx.user, fx.leaf));
}

#[test]
fn denied_middle_level_blocks_granted_leaf() {
    let fx = fixture();
    grant_only(&fx.conn, fx.user, &[fx.main, fx.leaf]);

    assert!(can_access(&fx.conn, fx.user, fx.main));
    assert!(!can_access(&fx.conn, fx.user, fx.sub));
    assert!(!can_access(&fx.conn, fx.user, fx.leaf));
}

#[test]
fn full_matrix_grants_the_leaf() {
    let fx = fixture();
    grant_only(&fx.conn, fx.user, &[fx.main, fx.sub, fx.leaf]);
    assert!(can_access(&fx.conn, fx.user, fx.leaf));
}

#[test]
fn revoking_root_hides_every_descendant() {
    let fx = fixture();
    grant_only(&fx.conn, fx.user, &[fx.main, fx.sub, fx.leaf]);
    assert!(can_access(&fx.conn, fx.user, fx.leaf));

    grant_only(&fx.conn, fx.user, &[fx.sub, fx.leaf]);
    assert!(!can_access(&fx.conn, fx.user, fx.main));
    assert!(!can_access(&fx.conn, fx.user, fx.sub));
    assert!(!can_access(&fx.conn, fx.user, fx.leaf));
}

#[test]
fn absent_grant_row_reads_as_unset_and_denies() {
    let fx = fixture();
    grant_only(&fx.conn, fx.user, &[fx.main, fx.sub, fx.leaf]);
    fx.conn
        .execute(
            "DELETE FROM user_category_access WHERE user_id = ?1 AND category_id = ?2;",
            [fx.user, fx.sub],
        )
        .unwrap();

    let store = SqliteAccessStore::try_new(&fx.conn).unwrap();
    assert_eq!(store.grant_state(fx.user, fx.sub).unwrap(), GrantState::Unset);
    assert_eq!(store.grant_state(fx.user, fx.main).unwrap(), GrantState::Granted);
    assert!(!store.grant(fx.user, fx.sub).unwrap());

    assert!(can_access(&fx.conn, fx.user, fx.main));
    assert!(!can_access(&fx.conn, fx.user, fx.sub));
    assert!(!can_access(&fx.conn, fx.user, fx.leaf));
}

#[test]
fn unknown_category_or_user_resolves_false() {
    let fx = fixture();
    grant_only(&fx.conn, fx.user, &[fx.main]);

    assert!(!can_access(&fx.conn, fx.user, 999));
    assert!(!can_access(&fx.conn, 999, fx.main));
}

#[test]
fn corrupted_parent_cycle_fails_closed() {
    let fx = fixture();
    fx.conn
        .execute_batch(
            "PRAGMA foreign_keys = OFF;
             INSERT INTO categories (id, title, parent_id, level)
             VALUES (10, 'Loop A', 11, 2),
                    (11, 'Loop B', 10, 2);
             PRAGMA foreign_keys = ON;",
        )
        .unwrap();
    grant_only(&fx.conn, fx.user, &[fx.main, 10, 11]);

    assert!(!can_access(&fx.conn, fx.user, 10));
    assert!(!can_access(&fx.conn, fx.user, 11));
    assert!(can_access(&fx.conn, fx.user, fx.main));

    let tree = SqliteCategoryRepository::try_new(&fx.conn).unwrap();
    assert!(matches!(
        tree.ancestors(10),
        Err(RepoError::CorruptHierarchy(10))
    ));
}

#[test]
fn one_view_serves_many_decisions() {
    let fx = fixture();
    grant_only(&fx.conn, fx.user, &[fx.main, fx.sub]);

    let tree = SqliteCategoryRepository::try_new(&fx.conn).unwrap();
    let store = SqliteAccessStore::try_new(&fx.conn).unwrap();
    let view = AccessResolver::new(&tree, &store).view(fx.user).unwrap();

    grant_only(&fx.conn, fx.user, &[]);

    assert_eq!(view.user_id(), fx.user);
    assert!(view.has_grant(fx.sub));
    assert!(view.can_access(fx.sub).unwrap());
    assert!(!view.can_access(fx.leaf).unwrap());
    assert!(!can_access(&fx.conn, fx.user, fx.sub));
}
