use rstest::*;
use std::collections::BTreeMap;

use marks::domain::bookmark::Bookmark;
use marks::domain::error::DomainError;
use marks::domain::repositories::repository::BookmarkRepository;
use marks::infrastructure::repositories::sqlite::error::SqliteRepositoryError;
use marks::infrastructure::repositories::sqlite::repository::SqliteRepository;
use marks::infrastructure::repositories::sqlite::schema::Table;
use marks::util::testing::{bookmark, init_test_env, setup_test_repo};
use tempfile::TempDir;

struct Fixture {
    repo: SqliteRepository,
    main: Table,
    deleted: Table,
    _dir: TempDir,
}

#[fixture]
fn fx() -> Fixture {
    let _ = init_test_env();
    let (repo, dir) = setup_test_repo();
    let main = repo.tables().main.clone();
    let deleted = repo.tables().deleted.clone();
    Fixture {
        repo,
        main,
        deleted,
        _dir: dir,
    }
}

fn tag_names(b: &Bookmark) -> Vec<&str> {
    b.tags.iter().map(|t| t.value()).collect()
}

#[rstest]
fn given_new_bookmark_when_insert_then_by_url_returns_it(fx: Fixture) {
    let inserted = fx
        .repo
        .insert(&fx.main, &bookmark("https://a.com", "go,cli"))
        .unwrap();

    let found = fx.repo.by_url(&fx.main, "https://a.com").unwrap();
    assert_eq!(found.id, inserted.id);
    assert_eq!(found.id, Some(1));
    assert!(found.same_content(&inserted));
    assert_eq!(tag_names(&found), vec!["go", "cli"]);
}

#[rstest]
fn given_existing_url_when_insert_then_duplicate_carries_id(fx: Fixture) {
    fx.repo.insert(&fx.main, &bookmark("https://a.com", "x")).unwrap();
    fx.repo.insert(&fx.main, &bookmark("https://b.com", "x")).unwrap();

    let result = fx.repo.insert(&fx.main, &bookmark("https://b.com/", "y"));
    match result {
        Err(DomainError::BookmarkExists { id, url }) => {
            assert_eq!(id, 2);
            assert_eq!(url, "https://b.com");
        }
        other => panic!("expected duplicate, got {:?}", other),
    }
}

#[rstest]
fn given_empty_url_when_insert_then_invalid(fx: Fixture) {
    let mut b = bookmark("https://a.com", "x");
    b.url = "   ".to_string();

    let result = fx.repo.insert(&fx.main, &b);
    assert!(matches!(result, Err(DomainError::InvalidBookmark(_))));
    assert_eq!(fx.repo.count(&fx.main).unwrap(), 0);
}

#[rstest]
fn given_tagged_bookmark_when_associate_again_then_no_duplicates(fx: Fixture) {
    fx.repo.insert(&fx.main, &bookmark("https://a.com", "go,cli")).unwrap();

    fx.repo.associate_tags("https://a.com", "go,cli").unwrap();
    fx.repo.associate_tags("https://a.com", "go,rust").unwrap();

    let found = fx.repo.by_url(&fx.main, "https://a.com").unwrap();
    assert_eq!(tag_names(&found), vec!["go", "cli", "rust"]);
    let counter = fx.repo.counter_tags().unwrap();
    assert_eq!(counter.get("go"), Some(&1));
}

#[rstest]
fn given_unknown_url_when_associate_then_not_exists(fx: Fixture) {
    let result = fx.repo.associate_tags("https://none.com", "x");
    assert!(matches!(result, Err(SqliteRepositoryError::NotExists { .. })));
}

#[rstest]
fn given_go_cli_bookmark_when_deleted_then_tags_vanish(fx: Fixture) {
    let inserted = fx
        .repo
        .insert(&fx.main, &bookmark("https://a.com", "go,cli"))
        .unwrap();
    let expected: BTreeMap<String, usize> =
        [("cli".to_string(), 1), ("go".to_string(), 1)].into_iter().collect();
    assert_eq!(fx.repo.counter_tags().unwrap(), expected);

    fx.repo.delete(&fx.main, inserted.id.unwrap()).unwrap();

    assert!(fx.repo.counter_tags().unwrap().is_empty());
}

#[rstest]
fn given_x_and_xy_bookmarks_when_by_tag_then_matching_rows(fx: Fixture) {
    fx.repo.insert(&fx.main, &bookmark("https://a.com", "x")).unwrap();
    fx.repo.insert(&fx.main, &bookmark("https://b.com", "x,y")).unwrap();

    assert_eq!(fx.repo.by_tag(&fx.main, "x").unwrap().len(), 2);
    let ys = fx.repo.by_tag(&fx.main, "y").unwrap();
    assert_eq!(ys.len(), 1);
    assert_eq!(ys[0].url, "https://b.com");

    let result = fx.repo.by_tag(&fx.main, "z");
    assert!(matches!(result, Err(DomainError::NoMatch(_))));
}

#[rstest]
fn given_rows_when_by_query_then_matches_any_column(fx: Fixture) {
    fx.repo.insert(&fx.main, &bookmark("https://rust-lang.org", "lang")).unwrap();
    fx.repo.insert(&fx.main, &bookmark("https://go.dev", "golang")).unwrap();

    assert_eq!(fx.repo.by_query(&fx.main, "rust").unwrap().len(), 1);
    assert_eq!(fx.repo.by_query(&fx.main, "golang").unwrap().len(), 1);
    assert_eq!(fx.repo.by_query(&fx.main, "description").unwrap().len(), 2);
    assert!(matches!(
        fx.repo.by_query(&fx.main, "nothing here"),
        Err(DomainError::NoMatch(_))
    ));
}

#[rstest]
fn given_like_wildcards_when_by_query_then_matched_literally(fx: Fixture) {
    let rows = [
        ("https://a.com", "50% off"),
        ("https://b.com", "500 things"),
        ("https://c.com", "snake_case"),
        ("https://d.com", "snakeXcase"),
    ];
    for (url, title) in rows {
        let b = Bookmark::new(url, title, "", "x").unwrap();
        fx.repo.insert(&fx.main, &b).unwrap();
    }

    let found = fx.repo.by_query(&fx.main, "50%").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].url, "https://a.com");

    let found = fx.repo.by_query(&fx.main, "e_c").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(found[0].url, "https://c.com");

    assert!(matches!(
        fx.repo.by_query(&fx.main, "\\"),
        Err(DomainError::NoMatch(_))
    ));
}

#[rstest]
fn given_all_rows_deleted_when_insert_then_id_restarts_at_one(fx: Fixture) {
    fx.repo
        .insert_bulk(
            &fx.main,
            &[bookmark("https://a.com", "x"), bookmark("https://b.com", "x")],
        )
        .unwrap();

    let removed = fx.repo.delete_bulk(&fx.main, &[1, 2, 99]).unwrap();
    assert_eq!(removed, 2);

    let inserted = fx.repo.insert(&fx.main, &bookmark("https://c.com", "x")).unwrap();
    assert_eq!(inserted.id, Some(1));
}

#[rstest]
fn given_duplicate_in_batch_when_insert_bulk_then_nothing_committed(fx: Fixture) {
    let batch = [
        bookmark("https://a.com", "x"),
        bookmark("https://b.com", "x"),
        bookmark("https://a.com", "y"),
    ];

    assert!(fx.repo.insert_bulk(&fx.main, &batch).is_err());
    assert_eq!(fx.repo.count(&fx.main).unwrap(), 0);
    assert!(fx.repo.counter_tags().unwrap().is_empty());
}

#[rstest]
fn given_missing_id_when_update_then_not_exists(fx: Fixture) {
    let mut b = bookmark("https://a.com", "x");
    b.set_id(42);

    let result = fx.repo.update(&fx.main, &b);
    assert!(matches!(result, Err(DomainError::BookmarkNotExists(_))));
}

#[rstest]
fn given_url_taken_when_update_then_duplicate(fx: Fixture) {
    fx.repo.insert(&fx.main, &bookmark("https://a.com", "x")).unwrap();
    let mut b = fx.repo.insert(&fx.main, &bookmark("https://b.com", "x")).unwrap();

    b.url = "https://a.com".to_string();
    let result = fx.repo.update(&fx.main, &b);
    assert!(matches!(result, Err(DomainError::BookmarkExists { id: 1, .. })));
}

#[rstest]
fn given_new_tags_when_update_with_tags_then_associations_replaced(fx: Fixture) {
    let mut b = fx
        .repo
        .insert(&fx.main, &bookmark("https://a.com", "old,keep"))
        .unwrap();
    b.set_tags(marks::domain::tag::Tag::parse_tags("keep,new").unwrap());
    b.update("New title".to_string(), "new desc".to_string());

    let updated = fx.repo.update_with_tags(&fx.main, &b).unwrap();

    assert_eq!(updated.title, "New title");
    assert_eq!(tag_names(&updated), vec!["keep", "new"]);
    let counter = fx.repo.counter_tags().unwrap();
    assert!(!counter.contains_key("old"));
}

#[rstest]
fn given_last_tag_removed_when_dissociate_then_bookmark_pruned(fx: Fixture) {
    fx.repo.insert(&fx.main, &bookmark("https://a.com", "x,y")).unwrap();

    fx.repo.dissociate_tags("https://a.com", "x").unwrap();
    let found = fx.repo.by_url(&fx.main, "https://a.com").unwrap();
    assert_eq!(tag_names(&found), vec!["y"]);

    fx.repo.dissociate_tags("https://a.com", "y").unwrap();
    assert!(fx.repo.by_url(&fx.main, "https://a.com").is_err());
}

#[rstest]
fn given_bookmarks_when_move_to_deleted_then_main_renumbered(fx: Fixture) {
    for url in ["https://a.com", "https://b.com", "https://c.com"] {
        fx.repo.insert(&fx.main, &bookmark(url, "x")).unwrap();
    }

    let moved = fx.repo.move_to_deleted(&[1, 77]).unwrap();
    assert_eq!(moved, 1);

    let live = fx.repo.all(&fx.main).unwrap();
    assert_eq!(live.iter().filter_map(|b| b.id).collect::<Vec<_>>(), vec![1, 2]);
    assert_eq!(live[0].url, "https://b.com");

    let gone = fx.repo.all(&fx.deleted).unwrap();
    assert_eq!(gone.len(), 1);
    assert_eq!(gone[0].url, "https://a.com");
    assert_eq!(tag_names(&gone[0]), vec!["x"]);
}

#[rstest]
fn given_unknown_ids_when_move_to_deleted_then_not_found(fx: Fixture) {
    fx.repo.insert(&fx.main, &bookmark("https://a.com", "x")).unwrap();

    let result = fx.repo.move_to_deleted(&[5, 6]);
    assert!(matches!(result, Err(SqliteRepositoryError::NotFound { .. })));
    assert_eq!(fx.repo.count(&fx.main).unwrap(), 1);
}

#[rstest]
fn given_deleted_bookmark_when_restored_then_back_with_tags(fx: Fixture) {
    fx.repo.insert(&fx.main, &bookmark("https://a.com", "go,cli")).unwrap();
    fx.repo.move_to_deleted(&[1]).unwrap();
    assert!(fx.repo.counter_tags().unwrap().is_empty());

    let restored = fx.repo.restore_from_deleted(&[1]).unwrap();

    assert_eq!(restored, 1);
    assert_eq!(fx.repo.count(&fx.deleted).unwrap(), 0);
    let found = fx.repo.by_url(&fx.main, "https://a.com").unwrap();
    assert_eq!(tag_names(&found), vec!["go", "cli"]);
    assert_eq!(fx.repo.counter_tags().unwrap().len(), 2);
}

#[rstest]
fn given_batch_when_restore_then_live_with_tags(fx: Fixture) {
    let batch = [bookmark("https://a.com", "go,cli"), bookmark("https://b.com/", "go")];

    fx.repo.restore(&batch).unwrap();

    assert_eq!(fx.repo.count(&fx.main).unwrap(), 2);
    let a = fx.repo.by_url(&fx.main, "https://a.com").unwrap();
    assert_eq!(tag_names(&a), vec!["go", "cli"]);
    assert_eq!(fx.repo.by_tag(&fx.main, "go").unwrap().len(), 2);
    assert_eq!(fx.repo.counter_tags().unwrap().get("go"), Some(&2));
}

#[rstest]
fn given_existing_url_in_batch_when_restore_then_nothing_committed(fx: Fixture) {
    fx.repo.insert(&fx.main, &bookmark("https://a.com", "x")).unwrap();
    let batch = [bookmark("https://b.com", "y"), bookmark("https://a.com", "z")];

    let result = fx.repo.restore(&batch);

    assert!(matches!(result, Err(SqliteRepositoryError::Duplicate { id: 1, .. })));
    assert_eq!(fx.repo.count(&fx.main).unwrap(), 1);
    assert!(fx.repo.by_url(&fx.main, "https://b.com").is_err());
    let expected: BTreeMap<String, usize> = [("x".to_string(), 1)].into_iter().collect();
    assert_eq!(fx.repo.counter_tags().unwrap(), expected);
}

#[rstest]
fn given_empty_repo_when_set_main_then_tags_follow_new_table(mut fx: Fixture) {
    let other = Table::new("other_bookmarks").unwrap();

    fx.repo.set_main(other.clone()).unwrap();
    fx.repo.insert(&other, &bookmark("https://a.com", "go,cli")).unwrap();

    assert_eq!(fx.repo.tables().main, other);
    let found = fx.repo.by_tag(&other, "go").unwrap();
    assert_eq!(found.len(), 1);
    assert_eq!(tag_names(&found[0]), vec!["go", "cli"]);
    assert_eq!(fx.repo.count(&fx.main).unwrap(), 0);

    // the cleanup trigger now prunes rows of the new table
    fx.repo.dissociate_tags("https://a.com", "go,cli").unwrap();
    assert_eq!(fx.repo.count(&other).unwrap(), 0);
    assert!(fx.repo.counter_tags().unwrap().is_empty());
}

#[rstest]
fn given_tagged_rows_when_set_main_then_tags_bound_and_main_kept(mut fx: Fixture) {
    fx.repo.insert(&fx.main, &bookmark("https://a.com", "x")).unwrap();

    let result = fx.repo.set_main(Table::new("other_bookmarks").unwrap());

    assert!(matches!(result, Err(SqliteRepositoryError::TagsBound { .. })));
    assert_eq!(fx.repo.tables().main, fx.main);
    assert_eq!(fx.repo.by_tag(&fx.main, "x").unwrap().len(), 1);
}

#[rstest]
fn given_new_table_when_set_deleted_then_soft_delete_lands_there(mut fx: Fixture) {
    let trash = Table::new("trash").unwrap();
    fx.repo.insert(&fx.main, &bookmark("https://a.com", "x")).unwrap();

    fx.repo.set_deleted(trash.clone()).unwrap();
    fx.repo.move_to_deleted(&[1]).unwrap();

    assert_eq!(fx.repo.count(&trash).unwrap(), 1);
    assert_eq!(fx.repo.count(&fx.deleted).unwrap(), 0);
}

#[rstest]
fn given_deleted_table_when_by_tag_then_reads_tag_column(fx: Fixture) {
    fx.repo.insert(&fx.deleted, &bookmark("https://a.com", "x,yz")).unwrap();

    assert_eq!(fx.repo.by_tag(&fx.deleted, "yz").unwrap().len(), 1);
    assert!(fx.repo.by_tag(&fx.deleted, "y").is_err());
    assert!(fx.repo.counter_tags().unwrap().is_empty());
}

#[rstest]
fn given_bookmark_when_record_visit_then_counter_grows(fx: Fixture) {
    let inserted = fx.repo.insert(&fx.main, &bookmark("https://a.com", "x")).unwrap();

    fx.repo.record_visit(&fx.main, 1).unwrap();
    let visited = fx.repo.record_visit(&fx.main, 1).unwrap();

    assert_eq!(visited.visit_count, 2);
    assert!(visited.last_visit >= inserted.last_visit);
    assert!(matches!(
        fx.repo.record_visit(&fx.main, 9),
        Err(DomainError::BookmarkNotFound(_))
    ));
}

#[rstest]
fn given_bookmark_when_toggle_favorite_twice_then_back_to_false(fx: Fixture) {
    fx.repo.insert(&fx.main, &bookmark("https://a.com", "x")).unwrap();

    assert!(fx.repo.toggle_favorite(&fx.main, 1).unwrap().favorite);
    assert!(!fx.repo.toggle_favorite(&fx.main, 1).unwrap().favorite);
}

#[rstest]
fn given_fresh_repo_when_is_empty_then_true(fx: Fixture) {
    assert!(fx.repo.is_empty(&fx.main, &fx.deleted).unwrap());
    fx.repo.insert(&fx.deleted, &bookmark("https://a.com", "x")).unwrap();
    assert!(!fx.repo.is_empty(&fx.main, &fx.deleted).unwrap());
    assert_eq!(fx.repo.max_id(&fx.deleted).unwrap(), 1);
}

#[rstest]
fn given_closed_repo_when_insert_then_error(fx: Fixture) {
    fx.repo.close();
    fx.repo.close();

    let result = fx.repo.insert(&fx.main, &bookmark("https://a.com", "x"));
    assert!(result.is_err());
}
