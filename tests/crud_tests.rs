//! Key/value helpers against a real SQLite file.

mod harness;

use diesel::sql_types::Text;
use diesel::QueryableByName;
use harness::models::{Author, Post, Setting, User, UserName};
use harness::temp_db::{TempDb, TAG};
use serde_json::json;
use tagdb::db::{Page, Record, RecordId, Upsert, Value};
use tagdb::error::Error;

/// `settings` seen through its name only, with nothing to write and no key
/// override.
#[derive(Debug, QueryableByName)]
struct SettingName {
    #[diesel(sql_type = Text)]
    name: String,
}

impl Record for SettingName {
    const TABLE: &'static str = "settings";
    const PRIMARY_KEY: &'static str = "name";
    const COLUMNS: &'static [&'static str] = &[];

    fn values(&self) -> Vec<(&'static str, Value)> {
        Vec::new()
    }
}

fn seed_users(db: &TempDb, count: usize) -> Vec<User> {
    (0..count)
        .map(|i| {
            let mut user = User::new("team", &format!("user{i}@example.com"));
            db.registry().create(TAG, &mut user).unwrap();
            user
        })
        .collect()
}

// -------------------------------------------------------------------------
// Create
// -------------------------------------------------------------------------

#[test]
fn create_assigns_id_and_timestamps() {
    let db = TempDb::create();
    let mut user = User::new("Ada", "ada@example.com");
    assert!(user.base.id.is_nil());

    db.registry().create(TAG, &mut user).unwrap();

    assert!(!user.base.id.is_nil());
    assert!(user.base.created_at.is_some());
    assert!(user.base.updated_at.is_some());

    let loaded: User = db
        .registry()
        .key_value_get(TAG, "id", user.base.id)
        .unwrap()
        .expect("user should exist");
    assert_eq!(loaded.base.id, user.base.id);
    assert_eq!(loaded.name, "Ada");
    assert!(loaded.base.created_at.is_some());
    assert!(loaded.base.deleted_at.is_none());
}

#[test]
fn create_keeps_caller_supplied_id() {
    let db = TempDb::create();
    let id = RecordId::new();
    let mut user = User::new("Ada", "ada@example.com");
    user.base.id = id;

    db.registry().create(TAG, &mut user).unwrap();

    assert_eq!(user.base.id, id);
    assert!(db
        .registry()
        .key_value_get::<User>(TAG, "id", id)
        .unwrap()
        .is_some());
}

#[test]
fn duplicate_email_is_a_unique_violation() {
    let db = TempDb::create();
    let mut first = User::new("Ada", "ada@example.com");
    let mut second = User::new("Other Ada", "ada@example.com");

    db.registry().create(TAG, &mut first).unwrap();
    let result = db.registry().create(TAG, &mut second);

    assert!(
        matches!(result, Err(Error::UniqueViolation(_))),
        "expected unique violation, got {result:?}"
    );
}

#[test]
fn create_from_map_generates_id_for_base_records() {
    let db = TempDb::create();

    let id = db
        .registry()
        .create_from_map::<User, _, _>(
            TAG,
            [
                ("name", Value::from("Grace")),
                ("email", Value::from("grace@example.com")),
                ("logins", Value::from(3_i64)),
            ],
        )
        .unwrap()
        .expect("an id should be generated");

    let loaded: User = db
        .registry()
        .key_value_get(TAG, "id", id)
        .unwrap()
        .unwrap();
    assert_eq!(loaded.email, "grace@example.com");
    assert_eq!(loaded.logins, 3);
    assert!(loaded.base.created_at.is_some());
}

#[test]
fn create_from_map_accepts_json_values() {
    let db = TempDb::create();
    let payload = json!({"name": "theme", "content": "dark", "version": 2});
    let columns = payload
        .as_object()
        .unwrap()
        .iter()
        .map(|(column, value)| (column.clone(), Value::from(value.clone())));

    let id = db
        .registry()
        .create_from_map::<Setting, _, _>(TAG, columns)
        .unwrap();

    assert!(id.is_none(), "plain records get no generated id");
    let loaded: Setting = db
        .registry()
        .key_value_get(TAG, "name", "theme")
        .unwrap()
        .unwrap();
    assert_eq!(loaded, Setting { name: "theme".into(), content: "dark".into(), version: 2 });
}

// -------------------------------------------------------------------------
// Reads
// -------------------------------------------------------------------------

#[test]
fn key_value_get_missing_returns_none() {
    let db = TempDb::create();
    let result = db
        .registry()
        .key_value_get::<User>(TAG, "email", "nobody@example.com")
        .unwrap();
    assert!(result.is_none());
}

#[test]
fn multi_key_value_get_requires_every_pair() {
    let db = TempDb::create();
    seed_users(&db, 3);

    let found: Option<User> = db
        .registry()
        .multi_key_value_get(
            TAG,
            &["name", "email"],
            &["team".into(), "user1@example.com".into()],
        )
        .unwrap();
    assert_eq!(found.unwrap().email, "user1@example.com");

    let missing: Option<User> = db
        .registry()
        .multi_key_value_get(
            TAG,
            &["name", "email"],
            &["someone else".into(), "user1@example.com".into()],
        )
        .unwrap();
    assert!(missing.is_none());
}

#[test]
fn multi_key_value_get_rejects_length_mismatch() {
    let db = TempDb::create();
    let result = db.registry().multi_key_value_get::<User>(
        TAG,
        &["name", "email"],
        &["team".into()],
    );
    assert!(matches!(
        result,
        Err(Error::KeyValueMismatch { keys: 2, values: 1 })
    ));
}

#[test]
fn key_value_get_list_paginates() {
    let db = TempDb::create();
    seed_users(&db, 5);
    let registry = db.registry();

    let first: Vec<User> = registry
        .key_value_get_list(TAG, "name", "team", Page::new(2, 0))
        .unwrap();
    let last: Vec<User> = registry
        .key_value_get_list(TAG, "name", "team", Page::new(2, 4))
        .unwrap();
    let all: Vec<User> = registry
        .key_value_get_list(TAG, "name", "team", Page::all())
        .unwrap();
    let none: Vec<User> = registry
        .key_value_get_list(TAG, "name", "other", Page::all())
        .unwrap();

    assert_eq!(first.len(), 2);
    assert_eq!(last.len(), 1);
    assert_eq!(all.len(), 5);
    assert!(none.is_empty());
}

#[test]
fn get_list_returns_every_live_row() {
    let db = TempDb::create();
    seed_users(&db, 4);

    let users: Vec<User> = db.registry().get_list(TAG, Page::all()).unwrap();
    let skipped: Vec<User> = db
        .registry()
        .get_list(TAG, Page { limit: None, offset: 3 })
        .unwrap();

    assert_eq!(users.len(), 4);
    assert_eq!(skipped.len(), 1);
}

#[test]
fn select_get_list_loads_projection() {
    let db = TempDb::create();
    seed_users(&db, 2);

    let names = db
        .registry()
        .key_value_select_get_list::<User, UserName>(TAG, "name", "name", "team", Page::all())
        .unwrap();

    assert_eq!(names, vec![UserName { name: "team".into() }; 2]);
}

#[test]
fn invalid_column_is_rejected_before_querying() {
    let db = TempDb::create();
    let result = db
        .registry()
        .key_value_get::<User>(TAG, "email = '' OR 1=1 --", "x");
    assert!(matches!(result, Err(Error::InvalidIdentifier(_))));

    let result = db.registry().key_value_select_get_list::<User, UserName>(
        TAG,
        "name; DROP TABLE users",
        "name",
        "team",
        Page::all(),
    );
    assert!(matches!(result, Err(Error::InvalidIdentifier(_))));
}

#[test]
fn unknown_tag_is_reported() {
    let db = TempDb::create();
    let result = db
        .registry()
        .key_value_get::<User>("missing", "email", "x");
    assert!(matches!(result, Err(Error::UnknownTag(ref tag)) if tag == "missing"));
}

// -------------------------------------------------------------------------
// Where-in
// -------------------------------------------------------------------------

#[test]
fn where_in_matches_listed_values() {
    let db = TempDb::create();
    seed_users(&db, 4);

    let users: Vec<User> = db
        .registry()
        .where_in(TAG, "email", ["user0@example.com", "user2@example.com", "nobody"])
        .unwrap();

    let mut emails: Vec<_> = users.into_iter().map(|u| u.email).collect();
    emails.sort();
    assert_eq!(emails, ["user0@example.com", "user2@example.com"]);
}

#[test]
fn where_in_with_empty_list_returns_nothing() {
    let db = TempDb::create();
    seed_users(&db, 2);

    let users: Vec<User> = db
        .registry()
        .where_in(TAG, "email", Vec::<String>::new())
        .unwrap();
    assert!(users.is_empty());

    let bad = db
        .registry()
        .where_in::<User, String>(TAG, "bad column", Vec::new());
    assert!(matches!(bad, Err(Error::InvalidIdentifier(_))));
}

#[test]
fn key_value_where_in_combines_both_filters() {
    let db = TempDb::create();
    seed_users(&db, 3);
    let mut outsider = User::new("solo", "solo@example.com");
    db.registry().create(TAG, &mut outsider).unwrap();

    let users: Vec<User> = db
        .registry()
        .key_value_where_in(
            TAG,
            "name",
            "team",
            "email",
            ["user1@example.com", "solo@example.com"],
        )
        .unwrap();

    assert_eq!(users.len(), 1);
    assert_eq!(users[0].email, "user1@example.com");
}

#[test]
fn key_value_where_in_select_projects_columns() {
    let db = TempDb::create();
    seed_users(&db, 3);

    let names = db
        .registry()
        .key_value_where_in_select::<User, UserName, _>(
            TAG,
            "name",
            "team",
            "name",
            "logins",
            [0_i64],
        )
        .unwrap();

    assert_eq!(names.len(), 3);
}

// -------------------------------------------------------------------------
// Updates
// -------------------------------------------------------------------------

#[test]
fn key_value_update_writes_all_columns() {
    let db = TempDb::create();
    let mut user = User::new("Ada", "ada@example.com");
    db.registry().create(TAG, &mut user).unwrap();
    let created_at = user.base.created_at;

    user.name = "Ada Lovelace".into();
    user.logins = 7;
    let id = user.base.id;
    let rows = db
        .registry()
        .key_value_update(TAG, &mut user, "id", id)
        .unwrap();

    assert_eq!(rows, 1);
    let loaded: User = db
        .registry()
        .key_value_get(TAG, "email", "ada@example.com")
        .unwrap()
        .unwrap();
    assert_eq!(loaded.name, "Ada Lovelace");
    assert_eq!(loaded.logins, 7);
    assert_eq!(loaded.base.id, user.base.id);
    assert!(loaded.base.created_at.is_some());
    assert!(user.base.updated_at >= created_at);
}

#[test]
fn key_value_update_without_match_touches_nothing() {
    let db = TempDb::create();
    let mut user = User::new("Ada", "ada@example.com");

    let rows = db
        .registry()
        .key_value_update(TAG, &mut user, "email", "ada@example.com")
        .unwrap();

    assert_eq!(rows, 0);
    assert!(db
        .registry()
        .get_list::<User>(TAG, Page::all())
        .unwrap()
        .is_empty());
}

#[test]
fn update_or_create_inserts_then_updates() {
    let db = TempDb::create();
    let registry = db.registry();

    let mut setting = Setting::new("theme", "light");
    let first = registry
        .key_value_update_or_create(TAG, &mut setting, "name", "theme")
        .unwrap();
    assert_eq!(first, Upsert::Created);

    setting.content = "dark".into();
    let second = registry
        .key_value_update_or_create(TAG, &mut setting, "name", "theme")
        .unwrap();
    assert_eq!(second, Upsert::Updated(1));

    let all: Vec<Setting> = registry.get_list(TAG, Page::all()).unwrap();
    assert_eq!(all, vec![Setting { name: "theme".into(), content: "dark".into(), version: 0 }]);
}

#[test]
fn update_or_create_assigns_id_on_insert() {
    let db = TempDb::create();
    let mut user = User::new("Ada", "ada@example.com");

    let outcome = db
        .registry()
        .key_value_update_or_create(TAG, &mut user, "email", "ada@example.com")
        .unwrap();

    assert_eq!(outcome, Upsert::Created);
    assert!(!user.base.id.is_nil());
}

#[test]
fn increment_uses_primary_key() {
    let db = TempDb::create();
    let users = seed_users(&db, 2);
    let registry = db.registry();

    assert_eq!(registry.increment(TAG, &users[0], "logins").unwrap(), 1);
    assert_eq!(registry.increment(TAG, &users[0], "logins").unwrap(), 1);

    let first: User = registry
        .key_value_get(TAG, "id", users[0].base.id)
        .unwrap()
        .unwrap();
    let second: User = registry
        .key_value_get(TAG, "id", users[1].base.id)
        .unwrap()
        .unwrap();
    assert_eq!(first.logins, 2);
    assert_eq!(second.logins, 0);
}

#[test]
fn increment_honours_custom_primary_key() {
    let db = TempDb::create();
    let mut setting = Setting::new("theme", "light");
    db.registry().create(TAG, &mut setting).unwrap();

    db.registry().increment(TAG, &setting, "version").unwrap();

    let loaded: Setting = db
        .registry()
        .key_value_get(TAG, "name", "theme")
        .unwrap()
        .unwrap();
    assert_eq!(loaded.version, 1);
}

#[test]
fn increment_without_key_value_is_rejected() {
    let db = TempDb::create();
    let users = seed_users(&db, 1);
    let mut setting = Setting::new("theme", "light");
    db.registry().create(TAG, &mut setting).unwrap();

    let unsaved = User::new("ghost", "ghost@example.com");
    let result = db.registry().increment(TAG, &unsaved, "logins");
    assert!(
        matches!(result, Err(Error::MissingPrimaryKey { table: "users" })),
        "got {result:?}"
    );

    let unkeyed = SettingName { name: "theme".into() };
    let result = db.registry().increment(TAG, &unkeyed, "version");
    assert!(
        matches!(result, Err(Error::MissingPrimaryKey { table: "settings" })),
        "got {result:?}"
    );

    let stored: User = db
        .registry()
        .key_value_get(TAG, "id", users[0].base.id)
        .unwrap()
        .unwrap();
    assert_eq!(stored.logins, 0);
}

#[test]
fn update_with_nothing_to_write_is_rejected() {
    let db = TempDb::create();
    let mut setting = Setting::new("theme", "light");
    db.registry().create(TAG, &mut setting).unwrap();

    let mut unkeyed = SettingName { name: "theme".into() };
    let result = db
        .registry()
        .key_value_update(TAG, &mut unkeyed, "name", "theme");
    assert!(
        matches!(result, Err(Error::EmptyUpdate { table: "settings" })),
        "got {result:?}"
    );

    let upsert = db
        .registry()
        .key_value_update_or_create(TAG, &mut unkeyed, "name", "theme");
    assert!(matches!(upsert, Err(Error::EmptyUpdate { .. })));
    assert_eq!(unkeyed.name, "theme");
}

#[test]
fn update_column_changes_only_that_column() {
    let db = TempDb::create();
    seed_users(&db, 2);

    let rows = db
        .registry()
        .key_value_update_column::<User>(TAG, "email", "user1@example.com", "name", "renamed")
        .unwrap();

    assert_eq!(rows, 1);
    let renamed: User = db
        .registry()
        .key_value_get(TAG, "email", "user1@example.com")
        .unwrap()
        .unwrap();
    let untouched: User = db
        .registry()
        .key_value_get(TAG, "email", "user0@example.com")
        .unwrap()
        .unwrap();
    assert_eq!(renamed.name, "renamed");
    assert_eq!(renamed.email, "user1@example.com");
    assert_eq!(untouched.name, "team");
}

#[test]
fn not_null_violation_is_translated() {
    let db = TempDb::create();
    seed_users(&db, 1);

    let result = db.registry().key_value_update_column::<User>(
        TAG,
        "email",
        "user0@example.com",
        "name",
        Value::Null,
    );

    assert!(
        matches!(result, Err(Error::NotNullViolation(_))),
        "expected not-null violation, got {result:?}"
    );
}

// -------------------------------------------------------------------------
// Deletes
// -------------------------------------------------------------------------

#[test]
fn delete_soft_deletes_base_records() {
    let db = TempDb::create();
    seed_users(&db, 2);
    let registry = db.registry();

    let rows = registry
        .key_value_delete::<User>(TAG, "email", "user0@example.com")
        .unwrap();
    assert_eq!(rows, 1);

    assert!(registry
        .key_value_get::<User>(TAG, "email", "user0@example.com")
        .unwrap()
        .is_none());
    assert_eq!(registry.get_list::<User>(TAG, Page::all()).unwrap().len(), 1);

    // The row still exists, so the unique email is still taken.
    let mut again = User::new("again", "user0@example.com");
    assert!(matches!(
        registry.create(TAG, &mut again),
        Err(Error::UniqueViolation(_))
    ));

    // Deleting twice finds nothing live.
    assert_eq!(
        registry
            .key_value_delete::<User>(TAG, "email", "user0@example.com")
            .unwrap(),
        0
    );
}

#[test]
fn hard_delete_removes_soft_deleted_rows() {
    let db = TempDb::create();
    seed_users(&db, 1);
    let registry = db.registry();

    registry
        .key_value_delete::<User>(TAG, "email", "user0@example.com")
        .unwrap();
    let rows = registry
        .key_value_hard_delete::<User>(TAG, "email", "user0@example.com")
        .unwrap();
    assert_eq!(rows, 1);

    let mut again = User::new("again", "user0@example.com");
    registry.create(TAG, &mut again).unwrap();
}

#[test]
fn delete_removes_plain_records() {
    let db = TempDb::create();
    let mut setting = Setting::new("theme", "light");
    db.registry().create(TAG, &mut setting).unwrap();

    let rows = db
        .registry()
        .key_value_delete::<Setting>(TAG, "name", "theme")
        .unwrap();

    assert_eq!(rows, 1);
    assert!(db
        .registry()
        .get_list::<Setting>(TAG, Page::all())
        .unwrap()
        .is_empty());
}

#[test]
fn hard_delete_of_referenced_row_is_a_foreign_key_violation() {
    let db = TempDb::create();
    let users = seed_users(&db, 1);
    let mut post = Post::by(&users[0], "Hello");
    db.registry().create(TAG, &mut post).unwrap();

    let result = db
        .registry()
        .key_value_hard_delete::<User>(TAG, "id", users[0].base.id);

    assert!(
        matches!(result, Err(Error::ForeignKeyViolation(_))),
        "expected foreign key violation, got {result:?}"
    );
}

// -------------------------------------------------------------------------
// Relations
// -------------------------------------------------------------------------

#[test]
fn get_with_relations_loads_posts() {
    let db = TempDb::create();
    let users = seed_users(&db, 2);
    for title in ["one", "two"] {
        let mut post = Post::by(&users[0], title);
        db.registry().create(TAG, &mut post).unwrap();
    }
    let mut other = Post::by(&users[1], "other");
    db.registry().create(TAG, &mut other).unwrap();

    let author: Author = db
        .registry()
        .key_value_get_with_relations(TAG, "id", users[0].base.id, &["posts"], false)
        .unwrap()
        .unwrap();

    let mut titles: Vec<_> = author.posts.iter().map(|p| p.title.as_str()).collect();
    titles.sort_unstable();
    assert_eq!(titles, ["one", "two"]);
}

#[test]
fn autoload_loads_declared_relations() {
    let db = TempDb::create();
    let users = seed_users(&db, 1);
    let mut post = Post::by(&users[0], "auto");
    db.registry().create(TAG, &mut post).unwrap();

    let with_autoload: Author = db
        .registry()
        .key_value_get_with_relations(TAG, "id", users[0].base.id, &[], true)
        .unwrap()
        .unwrap();
    let without: Author = db
        .registry()
        .key_value_get_with_relations(TAG, "id", users[0].base.id, &[], false)
        .unwrap()
        .unwrap();

    assert_eq!(with_autoload.posts.len(), 1);
    assert!(without.posts.is_empty());
}

#[test]
fn unknown_relation_is_rejected() {
    let db = TempDb::create();
    let users = seed_users(&db, 1);

    let result = db.registry().key_value_get_with_relations::<Author>(
        TAG,
        "id",
        users[0].base.id,
        &["comments"],
        false,
    );

    assert!(matches!(
        result,
        Err(Error::UnknownRelation { table: "users", ref relation }) if relation == "comments"
    ));
}

#[test]
fn relations_on_missing_record_return_none() {
    let db = TempDb::create();
    let result = db
        .registry()
        .key_value_get_with_relations::<Author>(TAG, "email", "nobody", &["posts"], true)
        .unwrap();
    assert!(result.is_none());
}
