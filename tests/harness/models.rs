use diesel::deserialize::{self, QueryableByName};
use diesel::row::NamedRow;
use diesel::sql_types::{BigInt, Text};
use diesel::sqlite::Sqlite;
use tagdb::db::{BaseModel, Page, Preload, Record, Registry, Value};
use tagdb::error::{Error, Result};

#[derive(Debug, Clone, QueryableByName)]
pub struct User {
    #[diesel(embed)]
    pub base: BaseModel,
    #[diesel(sql_type = Text)]
    pub name: String,
    #[diesel(sql_type = Text)]
    pub email: String,
    #[diesel(sql_type = BigInt)]
    pub logins: i64,
}

impl User {
    pub fn new(name: &str, email: &str) -> Self {
        Self {
            base: BaseModel::default(),
            name: name.to_string(),
            email: email.to_string(),
            logins: 0,
        }
    }
}

impl Record for User {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] = &[
        "name TEXT NOT NULL",
        "email TEXT NOT NULL UNIQUE",
        "logins INTEGER NOT NULL DEFAULT 0",
    ];
    const BASE: bool = true;

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("name", self.name.clone().into()),
            ("email", self.email.clone().into()),
            ("logins", self.logins.into()),
        ]
    }

    fn base(&self) -> Option<&BaseModel> {
        Some(&self.base)
    }

    fn base_mut(&mut self) -> Option<&mut BaseModel> {
        Some(&mut self.base)
    }
}

#[derive(Debug, Clone, QueryableByName)]
pub struct Post {
    #[diesel(embed)]
    pub base: BaseModel,
    #[diesel(sql_type = Text)]
    pub author_id: String,
    #[diesel(sql_type = Text)]
    pub title: String,
}

impl Post {
    pub fn by(author: &User, title: &str) -> Self {
        Self {
            base: BaseModel::default(),
            author_id: author.base.id.to_string(),
            title: title.to_string(),
        }
    }
}

impl Record for Post {
    const TABLE: &'static str = "posts";
    const COLUMNS: &'static [&'static str] = &[
        "author_id TEXT NOT NULL REFERENCES users (id)",
        "title TEXT NOT NULL",
    ];
    const BASE: bool = true;

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("author_id", self.author_id.clone().into()),
            ("title", self.title.clone().into()),
        ]
    }

    fn base(&self) -> Option<&BaseModel> {
        Some(&self.base)
    }

    fn base_mut(&mut self) -> Option<&mut BaseModel> {
        Some(&mut self.base)
    }
}

/// Read model over `users` that can carry its posts.
#[derive(Debug, Clone)]
pub struct Author {
    pub base: BaseModel,
    pub name: String,
    pub email: String,
    pub posts: Vec<Post>,
}

impl QueryableByName<Sqlite> for Author {
    fn build<'a>(row: &impl NamedRow<'a, Sqlite>) -> deserialize::Result<Self> {
        Ok(Self {
            base: <BaseModel as QueryableByName<Sqlite>>::build(row)?,
            name: NamedRow::get::<Text, String>(row, "name")?,
            email: NamedRow::get::<Text, String>(row, "email")?,
            posts: Vec::new(),
        })
    }
}

impl Record for Author {
    const TABLE: &'static str = "users";
    const COLUMNS: &'static [&'static str] = User::COLUMNS;
    const BASE: bool = true;

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("name", self.name.clone().into()),
            ("email", self.email.clone().into()),
        ]
    }

    fn base(&self) -> Option<&BaseModel> {
        Some(&self.base)
    }

    fn base_mut(&mut self) -> Option<&mut BaseModel> {
        Some(&mut self.base)
    }
}

impl Preload for Author {
    const RELATIONS: &'static [&'static str] = &["posts"];

    fn preload(&mut self, registry: &Registry, tag: &str, relation: &str) -> Result<()> {
        match relation {
            "posts" => {
                self.posts = registry.key_value_get_list::<Post>(
                    tag,
                    "author_id",
                    self.base.id,
                    Page::all(),
                )?;
                Ok(())
            }
            other => Err(Error::UnknownRelation {
                table: Self::TABLE,
                relation: other.to_string(),
            }),
        }
    }
}

/// Plain record without a base model, keyed by name.
#[derive(Debug, Clone, PartialEq, QueryableByName)]
pub struct Setting {
    #[diesel(sql_type = Text)]
    pub name: String,
    #[diesel(sql_type = Text)]
    pub content: String,
    #[diesel(sql_type = BigInt)]
    pub version: i64,
}

impl Setting {
    pub fn new(name: &str, content: &str) -> Self {
        Self {
            name: name.to_string(),
            content: content.to_string(),
            version: 0,
        }
    }
}

impl Record for Setting {
    const TABLE: &'static str = "settings";
    const PRIMARY_KEY: &'static str = "name";
    const COLUMNS: &'static [&'static str] = &[
        "name TEXT PRIMARY KEY NOT NULL",
        "content TEXT NOT NULL",
        "version INTEGER NOT NULL DEFAULT 0",
    ];

    fn values(&self) -> Vec<(&'static str, Value)> {
        vec![
            ("name", self.name.clone().into()),
            ("content", self.content.clone().into()),
            ("version", self.version.into()),
        ]
    }

    fn primary_key(&self) -> Value {
        self.name.clone().into()
    }
}

/// Projection of `users` used by the select helpers.
#[derive(Debug, Clone, PartialEq, QueryableByName)]
pub struct UserName {
    #[diesel(sql_type = Text)]
    pub name: String,
}
