use diesel::prelude::*;
use diesel_async::RunQueryDsl;
use rstest::rstest;

use super::*;
use crate::{
    categories::{CategoryInput, create_category, delete_category},
    error::StatusKind,
    models::Role,
    notifications::NotificationKind,
    test_support::{migrated_conn, seed_actor, seed_category},
};

fn article(title: &str, category_id: i32) -> ContentInput {
    ContentInput {
        title: title.to_owned(),
        content_type: "article".to_owned(),
        category_id,
        description: Some(format!("About {title}")),
        body: Some("Body text".to_owned()),
        tags: vec!["rust".to_owned(), "async".to_owned()],
        ..ContentInput::default()
    }
}

#[rstest]
#[tokio::test]
async fn initial_status_depends_on_role(#[future] migrated_conn: DbConnection) {
    let mut conn = migrated_conn.await;
    let writer = seed_actor(&mut conn, "writer", Role::TechWriter).await;
    let reader = seed_actor(&mut conn, "reader", Role::User).await;
    let cat = seed_category(&mut conn, &writer, "Rust").await;

    let draft = create_content(&mut conn, &writer, article("Draft", cat))
        .await
        .expect("writer draft");
    assert_eq!(draft.status, "draft");
    assert_eq!(draft.tags, vec!["rust", "async"]);
    assert_eq!(draft.author.username, "writer");
    assert_eq!(draft.category.slug, "rust");

    let asked = ContentInput {
        status: Some("approved".into()),
        ..article("Sneaky", cat)
    };
    let submitted = create_content(&mut conn, &reader, asked)
        .await
        .expect("user submission");
    assert_eq!(submitted.status, "pending");

    let bad = ContentInput {
        status: Some("approved".into()),
        ..article("Bad", cat)
    };
    let err = create_content(&mut conn, &writer, bad)
        .await
        .expect_err("writers cannot self-approve");
    assert_eq!(err.status(), StatusKind::BadRequest);
}

#[rstest]
#[case("", "article", "Missing required fields")]
#[case("Title", "podcast", "Invalid content type")]
#[tokio::test]
async fn submission_validates_fields(
    #[future] migrated_conn: DbConnection,
    #[case] title: &str,
    #[case] kind: &str,
    #[case] message: &str,
) {
    let mut conn = migrated_conn.await;
    let writer = seed_actor(&mut conn, "writer", Role::TechWriter).await;
    let cat = seed_category(&mut conn, &writer, "Rust").await;
    let input = ContentInput {
        content_type: kind.to_owned(),
        ..article(title, cat)
    };
    let err = create_content(&mut conn, &writer, input)
        .await
        .expect_err("must reject");
    assert_eq!(err.to_string(), message);
}

#[rstest]
#[tokio::test]
async fn unknown_category_is_not_found(#[future] migrated_conn: DbConnection) {
    let mut conn = migrated_conn.await;
    let writer = seed_actor(&mut conn, "writer", Role::TechWriter).await;
    let err = create_content(&mut conn, &writer, article("Orphan", 999))
        .await
        .expect_err("no category");
    assert_eq!(err.status(), StatusKind::NotFound);
    assert_eq!(err.to_string(), "Category not found");
}

#[rstest]
#[tokio::test]
async fn writers_approve_only_pending(#[future] migrated_conn: DbConnection) {
    let mut conn = migrated_conn.await;
    let writer = seed_actor(&mut conn, "writer", Role::TechWriter).await;
    let admin = seed_actor(&mut conn, "root", Role::Admin).await;
    let cat = seed_category(&mut conn, &writer, "Rust").await;
    let draft = create_content(&mut conn, &writer, article("Draft", cat))
        .await
        .expect("draft");

    let err = approve_content(&mut conn, &writer, draft.id)
        .await
        .expect_err("draft is not pending");
    assert_eq!(err.to_string(), "Only pending content can be approved");

    let approved = approve_content(&mut conn, &admin, draft.id)
        .await
        .expect("admins approve from any state");
    assert_eq!(approved.value.status, "approved");
    assert_eq!(approved.value.approved_by, Some(admin.user_id));
    assert!(approved.value.published_at.is_some());
}

#[rstest]
#[tokio::test]
async fn approval_notifies_author_and_subscribers(#[future] migrated_conn: DbConnection) {
    let mut conn = migrated_conn.await;
    let writer = seed_actor(&mut conn, "writer", Role::TechWriter).await;
    let reader = seed_actor(&mut conn, "reader", Role::User).await;
    let cat = seed_category(&mut conn, &writer, "Rust").await;
    crate::subscriptions::subscribe(&mut conn, &reader, cat, None)
        .await
        .expect("subscribe");
    let pending = create_content(&mut conn, &reader, article("Post", cat))
        .await
        .expect("submit");

    let outcome = approve_content(&mut conn, &writer, pending.id)
        .await
        .expect("approve");
    let kinds: Vec<_> = outcome
        .notifications
        .iter()
        .map(|n| (n.user_id, n.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            (reader.user_id, NotificationKind::ContentApproved),
            (reader.user_id, NotificationKind::NewContent),
        ]
    );
}

#[rstest]
#[tokio::test]
async fn flag_then_edit_clears_reason(#[future] migrated_conn: DbConnection) {
    let mut conn = migrated_conn.await;
    let writer = seed_actor(&mut conn, "writer", Role::TechWriter).await;
    let reader = seed_actor(&mut conn, "reader", Role::User).await;
    let cat = seed_category(&mut conn, &writer, "Rust").await;
    let item = create_content(&mut conn, &reader, article("Post", cat))
        .await
        .expect("submit");

    let blank = flag_content(&mut conn, &writer, item.id, "   ")
        .await
        .expect_err("blank reason");
    assert_eq!(blank.to_string(), "Flag reason is required");
    let denied = flag_content(&mut conn, &reader, item.id, "spam")
        .await
        .expect_err("users cannot flag");
    assert_eq!(denied.status(), StatusKind::Forbidden);

    let flagged = flag_content(&mut conn, &writer, item.id, "  off topic ")
        .await
        .expect("flag");
    assert_eq!(flagged.value.status, "flagged");
    assert_eq!(flagged.value.flag_reason.as_deref(), Some("off topic"));
    assert_eq!(flagged.notifications.len(), 1);

    let resubmit = ContentUpdate {
        status: Some("pending".into()),
        ..ContentUpdate::default()
    };
    let edited = update_content(&mut conn, &reader, item.id, resubmit)
        .await
        .expect("resubmit");
    assert_eq!(edited.status, "pending");
    assert_eq!(edited.flag_reason, None);
}

#[rstest]
#[tokio::test]
async fn edits_are_owner_or_admin(#[future] migrated_conn: DbConnection) {
    let mut conn = migrated_conn.await;
    let writer = seed_actor(&mut conn, "writer", Role::TechWriter).await;
    let other = seed_actor(&mut conn, "other", Role::TechWriter).await;
    let admin = seed_actor(&mut conn, "root", Role::Admin).await;
    let cat = seed_category(&mut conn, &writer, "Rust").await;
    let item = create_content(&mut conn, &writer, article("Post", cat))
        .await
        .expect("create");

    let retitle = ContentUpdate {
        title: Some("Renamed".into()),
        description: Some(None),
        ..ContentUpdate::default()
    };
    let denied = update_content(&mut conn, &other, item.id, retitle.clone())
        .await
        .expect_err("not the author");
    assert_eq!(denied.to_string(), "Unauthorized to edit this content");

    let edited = update_content(&mut conn, &admin, item.id, retitle)
        .await
        .expect("admin edit");
    assert_eq!(edited.title, "Renamed");
    assert_eq!(edited.description, None);

    let promote = ContentUpdate {
        status: Some("approved".into()),
        ..ContentUpdate::default()
    };
    let limited = update_content(&mut conn, &writer, item.id, promote)
        .await
        .expect_err("status is limited");
    assert_eq!(limited.status(), StatusKind::BadRequest);
}

#[rstest]
#[tokio::test]
async fn hidden_content_and_view_counting(#[future] migrated_conn: DbConnection) {
    let mut conn = migrated_conn.await;
    let admin = seed_actor(&mut conn, "root", Role::Admin).await;
    let reader = seed_actor(&mut conn, "reader", Role::User).await;
    let cat = seed_category(&mut conn, &admin, "Rust").await;
    let item = create_content(&mut conn, &reader, article("Post", cat))
        .await
        .expect("submit");

    let err = view_content(&mut conn, None, item.id)
        .await
        .expect_err("pending is hidden");
    assert_eq!(err.to_string(), "Content not available");
    let own = view_content(&mut conn, Some(&reader), item.id)
        .await
        .expect("author sees own");
    assert_eq!(own.views_count, 0);
    assert_eq!(own.body.as_deref(), Some("Body text"));

    approve_content(&mut conn, &admin, item.id)
        .await
        .expect("approve");
    view_content(&mut conn, None, item.id).await.expect("view");
    let seen = view_content(&mut conn, Some(&admin), item.id)
        .await
        .expect("view");
    assert_eq!(seen.views_count, 2);
}

#[rstest]
#[tokio::test]
async fn failure_after_insert_rolls_back(#[future] migrated_conn: DbConnection) {
    let mut conn = migrated_conn.await;
    let admin = seed_actor(&mut conn, "root", Role::Admin).await;
    let cat = seed_category(&mut conn, &admin, "Rust").await;
    // Rendering counts comments, so without the table it fails after the insert.
    diesel::sql_query("DROP TABLE comments")
        .execute(&mut conn)
        .await
        .expect("drop comments");

    let err = create_content(&mut conn, &admin, article("Orphan", cat))
        .await
        .expect_err("render fails");
    assert_eq!(err.status(), StatusKind::ServerError);
    let stored: i64 = crate::schema::content::table
        .count()
        .get_result(&mut conn)
        .await
        .expect("count");
    assert_eq!(stored, 0);
}

#[rstest]
#[tokio::test]
async fn body_is_emitted_only_when_requested_and_present(#[future] migrated_conn: DbConnection) {
    let mut conn = migrated_conn.await;
    let admin = seed_actor(&mut conn, "root", Role::Admin).await;
    let cat = seed_category(&mut conn, &admin, "Rust").await;
    let empty_body = ContentInput {
        body: Some(String::new()),
        ..article("Blank", cat)
    };
    let blank = create_content(&mut conn, &admin, empty_body).await.expect("blank");
    let blank_json = serde_json::to_value(&blank).expect("serialize");
    assert!(blank_json.get("body").is_none());

    let full = create_content(&mut conn, &admin, article("Full", cat))
        .await
        .expect("full");
    let full_json = serde_json::to_value(&full).expect("serialize");
    assert_eq!(full_json.get("body").and_then(|b| b.as_str()), Some("Body text"));

    approve_content(&mut conn, &admin, full.id).await.expect("approve");
    let listed = list_published(&mut conn, &BrowseQuery::default(), PageRequest::default())
        .await
        .expect("list");
    let first = listed.items.as_slice().first().expect("one item");
    assert_eq!(first.body, None);
}

#[rstest]
#[tokio::test]
async fn browsing_filters_and_queue(#[future] migrated_conn: DbConnection) {
    let mut conn = migrated_conn.await;
    let admin = seed_actor(&mut conn, "root", Role::Admin).await;
    let writer = seed_actor(&mut conn, "writer", Role::TechWriter).await;
    let reader = seed_actor(&mut conn, "reader", Role::User).await;
    let rust = seed_category(&mut conn, &admin, "Rust").await;
    let go = seed_category(&mut conn, &admin, "Go").await;
    for (title, cat) in [("Tokio Intro", rust), ("Goroutines", go), ("Serde Tricks", rust)] {
        let item = create_content(&mut conn, &reader, article(title, cat))
            .await
            .expect("submit");
        approve_content(&mut conn, &admin, item.id)
            .await
            .expect("approve");
    }
    create_content(&mut conn, &reader, article("Still pending", rust))
        .await
        .expect("submit");

    let all = list_published(&mut conn, &BrowseQuery::default(), PageRequest::default())
        .await
        .expect("list");
    assert_eq!(all.total, 3);

    let query = BrowseQuery {
        category_id: Some(rust),
        search: Some("tokio".into()),
        ..BrowseQuery::default()
    };
    let found = list_published(&mut conn, &query, PageRequest::default())
        .await
        .expect("search");
    assert_eq!(found.total, 1);
    assert_eq!(found.items.as_slice().first().map(|c| c.title.as_str()), Some("Tokio Intro"));

    let bad = BrowseQuery {
        content_type: Some("podcast".into()),
        ..BrowseQuery::default()
    };
    let bad_type = list_published(&mut conn, &bad, PageRequest::default())
        .await
        .expect_err("bad type");
    assert_eq!(bad_type.status(), StatusKind::BadRequest);

    let queue = list_pending(&mut conn, &admin, PageRequest::default())
        .await
        .expect("queue");
    assert_eq!(queue.total, 1);
    let denied = list_pending(&mut conn, &writer, PageRequest::default())
        .await
        .expect_err("admin only");
    assert_eq!(denied.status(), StatusKind::Forbidden);

    let mine = list_my_content(&mut conn, &reader, Some("pending"), PageRequest::default())
        .await
        .expect("mine");
    assert_eq!(mine.total, 1);
}

#[rstest]
#[tokio::test]
async fn recommendations_follow_subscriptions(#[future] migrated_conn: DbConnection) {
    let mut conn = migrated_conn.await;
    let admin = seed_actor(&mut conn, "root", Role::Admin).await;
    let reader = seed_actor(&mut conn, "reader", Role::User).await;
    let rust = seed_category(&mut conn, &admin, "Rust").await;
    let go = seed_category(&mut conn, &admin, "Go").await;
    let mut ids = Vec::new();
    for (title, cat) in [("Rusty", rust), ("Gopher", go)] {
        let item = create_content(&mut conn, &admin, article(title, cat))
            .await
            .expect("create");
        approve_content(&mut conn, &admin, item.id)
            .await
            .expect("approve");
        ids.push(item.id);
    }
    let gopher = ids.last().copied().expect("seeded");
    for _ in 0..3 {
        view_content(&mut conn, None, gopher).await.expect("view");
    }

    let popular = recommendations(&mut conn, &reader, None)
        .await
        .expect("fallback");
    assert_eq!(popular.as_slice().first().map(|c| c.title.as_str()), Some("Gopher"));

    crate::subscriptions::subscribe(&mut conn, &reader, rust, None)
        .await
        .expect("subscribe");
    let followed = recommendations(&mut conn, &reader, Some(500))
        .await
        .expect("subscribed");
    let titles: Vec<_> = followed.iter().map(|c| c.title.as_str()).collect();
    assert_eq!(titles, vec!["Rusty"]);
}

#[rstest]
#[tokio::test]
async fn categories_with_content_cannot_be_deleted(#[future] migrated_conn: DbConnection) {
    let mut conn = migrated_conn.await;
    let admin = seed_actor(&mut conn, "root", Role::Admin).await;
    let cat = create_category(
        &mut conn,
        &admin,
        CategoryInput {
            name: "Busy".into(),
            ..CategoryInput::default()
        },
    )
    .await
    .expect("category");
    let item = create_content(&mut conn, &admin, article("Post", cat.id))
        .await
        .expect("create");
    let err = delete_category(&mut conn, &admin, cat.id)
        .await
        .expect_err("not empty");
    assert_eq!(err.to_string(), "Cannot delete category with existing content");

    delete_content(&mut conn, &admin, item.id)
        .await
        .expect("delete content");
    delete_category(&mut conn, &admin, cat.id)
        .await
        .expect("now empty");
}

#[rstest]
#[tokio::test]
async fn only_owner_or_admin_deletes(#[future] migrated_conn: DbConnection) {
    let mut conn = migrated_conn.await;
    let writer = seed_actor(&mut conn, "writer", Role::TechWriter).await;
    let other = seed_actor(&mut conn, "other", Role::User).await;
    let cat = seed_category(&mut conn, &writer, "Rust").await;
    let item = create_content(&mut conn, &writer, article("Post", cat))
        .await
        .expect("create");
    let denied = delete_content(&mut conn, &other, item.id)
        .await
        .expect_err("not owner");
    assert_eq!(denied.status(), StatusKind::Forbidden);
    delete_content(&mut conn, &writer, item.id)
        .await
        .expect("owner deletes");
    let gone = delete_content(&mut conn, &writer, item.id)
        .await
        .expect_err("gone");
    assert_eq!(gone.status(), StatusKind::NotFound);
}
