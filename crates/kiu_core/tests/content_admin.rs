use kiu_core::model::content::ContentValidationError;
use kiu_core::repo::notification_repo::{NotificationRepository, SqliteNotificationRepository};
use kiu_core::{
    open_db_in_memory, CategoryId, CategoryService, ContentAdminService, ContentServiceError,
    ContentType, NewCategory, NewContent, NotificationType,
};
use rusqlite::Connection;

fn setup() -> (Connection, CategoryId) {
    let conn = open_db_in_memory().unwrap();
    let category = CategoryService::try_new(&conn)
        .unwrap()
        .create_category(&NewCategory {
            title: "Pharmacology".to_string(),
            image: None,
            parent_id: None,
            is_active: true,
        })
        .unwrap()
        .id;
    conn.execute("DELETE FROM notifications;", []).unwrap();
    (conn, category)
}

fn lecture(category_id: CategoryId) -> NewContent {
    NewContent {
        category_id,
        content_type: ContentType::Video,
        url: "https://cdn.example.com/pharmacology/week1.mp4".to_string(),
        title: "Week 1 lecture".to_string(),
        is_active: true,
    }
}

fn row_count(conn: &Connection, table: &str) -> i64 {
    conn.query_row(&format!("SELECT COUNT(*) FROM {table};"), [], |row| {
        row.get(0)
    })
    .unwrap()
}

#[test]
fn active_content_posts_a_scoped_announcement() {
    let (conn, category) = setup();
    let service = ContentAdminService::try_new(&conn).unwrap();

    service.create_content(&lecture(category)).unwrap();
    service
        .create_content(&NewContent {
            title: "Draft slides".to_string(),
            is_active: false,
            ..lecture(category)
        })
        .unwrap();

    let notifications = SqliteNotificationRepository::try_new(&conn)
        .unwrap()
        .list_notifications(true)
        .unwrap();
    assert_eq!(notifications.len(), 1);
    assert_eq!(notifications[0].title, "New VIDEO Material Available");
    assert_eq!(notifications[0].category_id, Some(category));
    assert_eq!(notifications[0].kind, NotificationType::Success);
    assert_eq!(notifications[0].priority, 20);
}

#[test]
fn rejected_writes_leave_no_rows() {
    let (conn, category) = setup();
    let service = ContentAdminService::try_new(&conn).unwrap();

    assert!(matches!(
        service.create_content(&lecture(999)),
        Err(ContentServiceError::CategoryNotFound(999))
    ));
    assert!(matches!(
        service.create_content(&NewContent {
            url: "week1.mp4".to_string(),
            ..lecture(category)
        }),
        Err(ContentServiceError::Validation(ContentValidationError::InvalidUrl(_)))
    ));
    assert_eq!(row_count(&conn, "contents"), 0);
    assert_eq!(row_count(&conn, "notifications"), 0);
}

#[test]
fn update_and_delete_report_missing_content() {
    let (conn, category) = setup();
    let service = ContentAdminService::try_new(&conn).unwrap();

    assert!(matches!(
        service.update_content(404, &lecture(category)),
        Err(ContentServiceError::ContentNotFound(404))
    ));
    assert!(matches!(
        service.delete_content(404),
        Err(ContentServiceError::ContentNotFound(404))
    ));

    let created = service.create_content(&lecture(category)).unwrap();
    let renamed = service
        .update_content(
            created.id,
            &NewContent {
                title: "Week 1 lecture (revised)".to_string(),
                ..lecture(category)
            },
        )
        .unwrap();
    assert_eq!(renamed.title, "Week 1 lecture (revised)");
    service.delete_content(created.id).unwrap();
    assert_eq!(row_count(&conn, "contents"), 0);
}
