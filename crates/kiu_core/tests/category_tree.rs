use kiu_core::repo::notification_repo::{NotificationRepository, SqliteNotificationRepository};
use kiu_core::{
    open_db, open_db_in_memory, AccessStore, Category, CategoryId, CategoryLevel, CategoryPatch,
    CategoryService, CategoryServiceError, CategoryTree, DbError, GrantState, NewCategory,
    NewUser, NotificationType, RepoError, SqliteAccessStore, UnitOfWork, UserAccessService,
    UserRole,
};
use rusqlite::Connection;
use std::time::Duration;

fn new_category(title: &str, parent_id: Option<CategoryId>) -> NewCategory {
    NewCategory {
        title: title.to_string(),
        image: None,
        parent_id,
        is_active: true,
    }
}

fn create(service: &CategoryService<'_>, title: &str, parent_id: Option<CategoryId>) -> Category {
    service
        .create_category(&new_category(title, parent_id))
        .unwrap()
}

fn register(conn: &Connection, kiu_id: &str) -> i64 {
    UserAccessService::try_new(conn)
        .unwrap()
        .register_user(&NewUser {
            kiu_id: kiu_id.to_string(),
            name: format!("Student {kiu_id}"),
            whatsapp_number: None,
            role: UserRole::User,
        })
        .unwrap()
        .id
}

#[test]
fn level_is_derived_from_parent() {
    let conn = open_db_in_memory().unwrap();
    let service = CategoryService::try_new(&conn).unwrap();

    let main = create(&service, "Medicine", None);
    let sub = create(&service, "Anatomy", Some(main.id));
    let leaf = create(&service, "Upper Limb", Some(sub.id));

    assert_eq!(main.level, CategoryLevel::Main);
    assert_eq!(sub.level, CategoryLevel::Sub);
    assert_eq!(leaf.level, CategoryLevel::Leaf);
    assert_eq!(leaf.parent_id, Some(sub.id));
}

#[test]
fn fourth_level_and_missing_parent_are_rejected() {
    let conn = open_db_in_memory().unwrap();
    let service = CategoryService::try_new(&conn).unwrap();
    let main = create(&service, "Medicine", None);
    let sub = create(&service, "Anatomy", Some(main.id));
    let leaf = create(&service, "Upper Limb", Some(sub.id));

    let too_deep = service
        .create_category(&new_category("Hand", Some(leaf.id)))
        .unwrap_err();
    assert!(matches!(
        too_deep,
        CategoryServiceError::DepthExceeded { parent_id } if parent_id == leaf.id
    ));

    let orphan = service
        .create_category(&new_category("Lost", Some(999)))
        .unwrap_err();
    assert!(matches!(orphan, CategoryServiceError::ParentNotFound(999)));

    let blank = service
        .create_category(&new_category("   ", None))
        .unwrap_err();
    assert!(matches!(blank, CategoryServiceError::InvalidTitle));

    assert_eq!(service.tree().list_all().unwrap().len(), 3);
}

#[test]
fn children_are_ordered_and_ancestors_walk_to_root() {
    let conn = open_db_in_memory().unwrap();
    let service = CategoryService::try_new(&conn).unwrap();
    let main = create(&service, "Medicine", None);
    let second = create(&service, "Physiology", Some(main.id));
    let first = create(&service, "Anatomy", Some(main.id));
    let leaf = create(&service, "Upper Limb", Some(first.id));
    let tree = service.tree();

    let children: Vec<CategoryId> = tree
        .children(main.id)
        .unwrap()
        .iter()
        .map(|category| category.id)
        .collect();
    assert_eq!(children, vec![second.id, first.id]);

    let ancestors: Vec<CategoryId> = tree
        .ancestors(leaf.id)
        .unwrap()
        .iter()
        .map(|category| category.id)
        .collect();
    assert_eq!(ancestors, vec![first.id, main.id]);

    assert_eq!(tree.parent(main.id).unwrap(), None);
    assert_eq!(tree.parent(leaf.id).unwrap().map(|c| c.id), Some(first.id));
    assert_eq!(tree.subtree_height(main.id).unwrap(), 3);
    assert!(matches!(
        tree.children(999),
        Err(RepoError::NotFound { entity: "category", id: 999 })
    ));
}

#[test]
fn delete_is_rejected_while_children_exist() {
    let conn = open_db_in_memory().unwrap();
    let service = CategoryService::try_new(&conn).unwrap();
    let main = create(&service, "Medicine", None);
    let sub = create(&service, "Anatomy", Some(main.id));

    assert!(matches!(
        service.delete_category(main.id),
        Err(CategoryServiceError::HasChildren(id)) if id == main.id
    ));

    service.delete_category(sub.id).unwrap();
    service.delete_category(main.id).unwrap();
    assert!(service.tree().roots().unwrap().is_empty());
    assert!(matches!(
        service.delete_category(main.id),
        Err(CategoryServiceError::CategoryNotFound(_))
    ));
}

#[test]
fn new_category_seeds_denied_grants_for_existing_users() {
    let conn = open_db_in_memory().unwrap();
    let first = register(&conn, "2024001");
    let second = register(&conn, "2024002");
    let service = CategoryService::try_new(&conn).unwrap();

    let main = create(&service, "Medicine", None);

    let store = SqliteAccessStore::try_new(&conn).unwrap();
    assert_eq!(store.grant_state(first, main.id).unwrap(), GrantState::Denied);
    assert_eq!(store.grant_state(second, main.id).unwrap(), GrantState::Denied);
}

#[test]
fn only_active_categories_are_announced() {
    let conn = open_db_in_memory().unwrap();
    let service = CategoryService::try_new(&conn).unwrap();

    let main = create(&service, "Medicine", None);
    service
        .create_category(&NewCategory {
            is_active: false,
            ..new_category("Drafts", None)
        })
        .unwrap();
    create(&service, "Anatomy", Some(main.id));

    let notifications = SqliteNotificationRepository::try_new(&conn)
        .unwrap()
        .list_notifications(true)
        .unwrap();
    let titles: Vec<&str> = notifications
        .iter()
        .map(|notification| notification.title.as_str())
        .collect();
    assert_eq!(titles, vec!["New Sub Category Added", "New Main Category Added"]);
    assert!(notifications.iter().all(|notification| {
        notification.kind == NotificationType::Success
            && notification.priority == 15
            && notification.category_id.is_none()
    }));
}

#[test]
fn update_trims_title_and_clears_blank_image() {
    let conn = open_db_in_memory().unwrap();
    let service = CategoryService::try_new(&conn).unwrap();
    let main = service
        .create_category(&NewCategory {
            image: Some("categories/medicine.png".to_string()),
            ..new_category("Medicine", None)
        })
        .unwrap();
    assert_eq!(main.image.as_deref(), Some("categories/medicine.png"));

    let updated = service
        .update_category(
            main.id,
            &CategoryPatch {
                title: Some("  Clinical Medicine ".to_string()),
                image: Some(Some("  ".to_string())),
                is_active: Some(false),
            },
        )
        .unwrap();
    assert_eq!(updated.title, "Clinical Medicine");
    assert_eq!(updated.image, None);
    assert!(!updated.is_active);
    assert_eq!(updated.level, CategoryLevel::Main);
}

#[test]
fn move_relevels_the_whole_subtree() {
    let conn = open_db_in_memory().unwrap();
    let service = CategoryService::try_new(&conn).unwrap();
    let main = create(&service, "Medicine", None);
    let sub = create(&service, "Anatomy", Some(main.id));
    let leaf = create(&service, "Upper Limb", Some(sub.id));

    let detached = service.move_category(sub.id, None).unwrap();
    assert_eq!(detached.level, CategoryLevel::Main);
    assert_eq!(detached.parent_id, None);
    let tree = service.tree();
    assert_eq!(tree.require(leaf.id).unwrap().level, CategoryLevel::Sub);

    let moved = service.move_category(main.id, Some(leaf.id)).unwrap();
    assert_eq!(moved.level, CategoryLevel::Leaf);
    assert_eq!(tree.ancestors(main.id).unwrap().len(), 2);
}

#[test]
fn move_rejects_cycles_and_depth_overflow() {
    let conn = open_db_in_memory().unwrap();
    let service = CategoryService::try_new(&conn).unwrap();
    let main = create(&service, "Medicine", None);
    let sub = create(&service, "Anatomy", Some(main.id));
    let leaf = create(&service, "Upper Limb", Some(sub.id));
    let other = create(&service, "Pharmacy", None);

    assert!(matches!(
        service.move_category(main.id, Some(leaf.id)),
        Err(CategoryServiceError::CycleDetected { category_id, parent_id })
            if category_id == main.id && parent_id == leaf.id
    ));
    assert!(matches!(
        service.move_category(sub.id, Some(sub.id)),
        Err(CategoryServiceError::CycleDetected { .. })
    ));
    assert!(matches!(
        service.move_category(main.id, Some(other.id)),
        Err(CategoryServiceError::DepthExceeded { .. })
    ));

    let tree = service.tree();
    assert_eq!(tree.require(main.id).unwrap().parent_id, None);
    assert_eq!(tree.require(leaf.id).unwrap().level, CategoryLevel::Leaf);
}

#[test]
fn move_checks_run_under_the_write_lock() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("kiu.db");
    let first = open_db(&path).unwrap();
    let second = open_db(&path).unwrap();
    first.busy_timeout(Duration::from_millis(50)).unwrap();

    let service = CategoryService::try_new(&first).unwrap();
    let medicine = create(&service, "Medicine", None);
    let pharmacy = create(&service, "Pharmacy", None);
    let other_admin = CategoryService::try_new(&second).unwrap();

    let held = UnitOfWork::begin(&second).unwrap();
    assert!(matches!(
        service.move_category(medicine.id, Some(medicine.id)),
        Err(CategoryServiceError::Repo(RepoError::Db(DbError::Sqlite(_))))
    ));
    held.rollback().unwrap();

    other_admin
        .move_category(pharmacy.id, Some(medicine.id))
        .unwrap();
    assert!(matches!(
        service.move_category(medicine.id, Some(pharmacy.id)),
        Err(CategoryServiceError::CycleDetected { .. })
    ));
    assert_eq!(service.tree().get(medicine.id).unwrap().unwrap().parent_id, None);
}
