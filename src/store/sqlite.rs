use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, Row, ToSql, TransactionBehavior, params};

use super::schema::SCHEMA;
use super::{Store, TiddlerWrite};
use crate::error::{Error, Result};
use crate::types::*;

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let conn = Connection::open(db_path)?;
        Self::configure(conn)
    }

    /// Opens a private in-memory database.
    pub fn in_memory() -> Result<Self> {
        Self::configure(Connection::open_in_memory()?)
    }

    fn configure(conn: Connection) -> Result<Self> {
        conn.pragma_update(None, "foreign_keys", "ON")?;
        conn.pragma_update(None, "journal_mode", "WAL")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn conn(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Returns a guard to the underlying database connection.
    /// This allows consuming applications to execute custom SQL.
    pub fn connection(&self) -> std::sync::MutexGuard<'_, Connection> {
        self.conn()
    }
}

fn parse_datetime(s: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .or_else(|_| {
            // Handle SQLite's default datetime format: "YYYY-MM-DD HH:MM:SS"
            chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").map(|ndt| ndt.and_utc())
        })
        .unwrap_or_else(|e| {
            tracing::warn!("Invalid datetime in database: '{}' - {}", s, e);
            Utc::now()
        })
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

/// Maps uniqueness violations to `AlreadyExists` and dangling references to
/// `NotFound`; anything else stays a storage error.
fn map_constraint(e: rusqlite::Error) -> Error {
    match e {
        rusqlite::Error::SqliteFailure(err, _)
            if err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY =>
        {
            Error::NotFound
        }
        rusqlite::Error::SqliteFailure(err, _)
            if err.code == rusqlite::ErrorCode::ConstraintViolation =>
        {
            Error::AlreadyExists
        }
        e => Error::from(e),
    }
}

fn permission_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Permission> {
    let raw: i64 = row.get(idx)?;
    Permission::try_from(raw).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Integer, Box::new(e))
    })
}

fn attachment_column(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<AttachmentRef>> {
    let raw: Option<String> = row.get(idx)?;
    raw.map(|hash| {
        AttachmentRef::parse(&hash).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                idx,
                rusqlite::types::Type::Text,
                format!("invalid attachment hash '{hash}'").into(),
            )
        })
    })
    .transpose()
}

fn bag_from_row(row: &Row<'_>, offset: usize) -> rusqlite::Result<Bag> {
    Ok(Bag {
        id: row.get(offset)?,
        name: row.get(offset + 1)?,
        description: row.get(offset + 2)?,
        owner: row.get(offset + 3)?,
        created_at: parse_datetime(&row.get::<_, String>(offset + 4)?),
    })
}

fn recipe_from_row(row: &Row<'_>) -> rusqlite::Result<Recipe> {
    Ok(Recipe {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        owner: row.get(3)?,
        required_plugins: PluginSet::new(),
        skip_required_plugins: row.get(4)?,
        skip_core: row.get(5)?,
        created_at: parse_datetime(&row.get::<_, String>(6)?),
    })
}

fn head_from_row(row: &Row<'_>) -> rusqlite::Result<TiddlerHead> {
    Ok(TiddlerHead {
        bag_id: row.get(0)?,
        title: row.get(1)?,
        version: Version::new(row.get(2)?),
        is_deleted: row.get(3)?,
    })
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        password: row.get(3)?,
        created_at: parse_datetime(&row.get::<_, String>(4)?),
        last_login: row.get::<_, Option<String>>(5)?.map(|s| parse_datetime(&s)),
    })
}

fn load_plugins(conn: &Connection, recipe: &mut Recipe) -> Result<()> {
    let mut stmt =
        conn.prepare("SELECT name FROM recipe_plugins WHERE recipe_id = ?1 ORDER BY name")?;
    let names = stmt.query_map(params![recipe.id], |row| row.get::<_, String>(0))?;
    recipe.required_plugins = names.collect::<std::result::Result<PluginSet, _>>()?;
    Ok(())
}

fn replace_plugins(conn: &Connection, recipe: &Recipe) -> Result<()> {
    conn.execute(
        "DELETE FROM recipe_plugins WHERE recipe_id = ?1",
        params![recipe.id],
    )?;
    for name in &recipe.required_plugins {
        conn.execute(
            "INSERT INTO recipe_plugins (recipe_id, name) VALUES (?1, ?2)",
            params![recipe.id, name],
        )?;
    }
    Ok(())
}

fn replace_layers(conn: &Connection, recipe_id: &str, layers: &[RecipeLayer]) -> Result<()> {
    conn.execute(
        "DELETE FROM recipe_layers WHERE recipe_id = ?1",
        params![recipe_id],
    )?;

    for layer in layers {
        conn.execute(
            "INSERT INTO recipe_layers (recipe_id, bag_id, position, with_acl, load_modules)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                recipe_id,
                layer.bag_id,
                layer.position,
                layer.with_acl,
                layer.load_modules,
            ],
        )
        .map_err(map_constraint)?;
    }
    Ok(())
}

fn replace_acl(conn: &Connection, recipe_id: &str, rows: &[RecipeAcl]) -> Result<()> {
    conn.execute(
        "DELETE FROM recipe_acl WHERE recipe_id = ?1",
        params![recipe_id],
    )?;

    for acl in rows {
        conn.execute(
            "INSERT INTO recipe_acl (role_id, recipe_id, permission) VALUES (?1, ?2, ?3)",
            params![acl.role_id, recipe_id, i64::from(acl.permission)],
        )
        .map_err(map_constraint)?;
    }
    Ok(())
}

impl Store for SqliteStore {
    fn initialize(&self) -> Result<()> {
        self.conn().execute_batch(SCHEMA)?;
        Ok(())
    }

    // Bag operations

    fn create_bag(&self, bag: &Bag) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO bags (id, name, description, owner, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    bag.id,
                    bag.name,
                    bag.description,
                    bag.owner,
                    format_datetime(&bag.created_at),
                ],
            )
            .map_err(map_constraint)?;
        Ok(())
    }

    fn get_bag(&self, id: &str) -> Result<Option<Bag>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, description, owner, created_at FROM bags WHERE id = ?1",
            params![id],
            |row| bag_from_row(row, 0),
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_bag_by_name(&self, name: &str) -> Result<Option<Bag>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, description, owner, created_at FROM bags WHERE name = ?1",
            params![name],
            |row| bag_from_row(row, 0),
        )
        .optional()
        .map_err(Error::from)
    }

    fn list_bags(&self) -> Result<Vec<Bag>> {
        let conn = self.conn();
        let mut stmt =
            conn.prepare("SELECT id, name, description, owner, created_at FROM bags ORDER BY name")?;

        let rows = stmt.query_map([], |row| bag_from_row(row, 0))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn delete_bag(&self, id: &str) -> Result<bool> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "DELETE FROM fields WHERE version IN (SELECT version FROM tiddlers WHERE bag_id = ?1)",
            params![id],
        )?;
        let rows = tx.execute("DELETE FROM bags WHERE id = ?1", params![id])?;
        tx.commit()?;
        Ok(rows > 0)
    }

    // Tiddler operations

    fn get_tiddler(&self, bag_id: &str, title: &str) -> Result<Option<Tiddler>> {
        let conn = self.conn();
        let tiddler = conn
            .query_row(
                "SELECT bag_id, title, version, is_deleted, attachment_hash, modified
                 FROM tiddlers WHERE bag_id = ?1 AND title = ?2",
                params![bag_id, title],
                |row| {
                    Ok(Tiddler {
                        bag_id: row.get(0)?,
                        title: row.get(1)?,
                        version: Version::new(row.get(2)?),
                        is_deleted: row.get(3)?,
                        attachment: attachment_column(row, 4)?,
                        fields: Fields::new(),
                        modified: parse_datetime(&row.get::<_, String>(5)?),
                    })
                },
            )
            .optional()?;

        let Some(mut tiddler) = tiddler else {
            return Ok(None);
        };

        let mut stmt = conn.prepare("SELECT name, value FROM fields WHERE version = ?1")?;
        let fields = stmt.query_map(params![tiddler.version.get()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        tiddler.fields = fields.collect::<std::result::Result<Fields, _>>()?;

        Ok(Some(tiddler))
    }

    fn write_tiddler(&self, write: &TiddlerWrite<'_>) -> Result<Version> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let slot: Option<(Version, bool)> = tx
            .query_row(
                "SELECT version, is_deleted FROM tiddlers WHERE bag_id = ?1 AND title = ?2",
                params![write.bag_id, write.title],
                |row| Ok((Version::new(row.get(0)?), row.get::<_, bool>(1)?)),
            )
            .optional()?;
        let current = slot.map(|(version, _)| version);

        if write.require_live && !matches!(slot, Some((_, false))) {
            return Err(Error::NotFound);
        }

        if let Some(expected) = write.expected {
            if current != Some(expected) {
                return Err(Error::Conflict {
                    expected,
                    actual: current,
                });
            }
        }

        let version: i64 = tx.query_row(
            "UPDATE version_counter SET value = value + 1 WHERE id = 1 RETURNING value",
            [],
            |row| row.get(0),
        )?;

        if let Some(old) = current {
            tx.execute("DELETE FROM fields WHERE version = ?1", params![old.get()])?;
        }

        tx.execute(
            "INSERT INTO tiddlers (bag_id, title, version, is_deleted, attachment_hash, modified)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)
             ON CONFLICT (bag_id, title) DO UPDATE SET
                version = excluded.version,
                is_deleted = excluded.is_deleted,
                attachment_hash = excluded.attachment_hash,
                modified = excluded.modified",
            params![
                write.bag_id,
                write.title,
                version,
                write.deleted,
                write.attachment.map(AttachmentRef::as_str),
                format_datetime(&Utc::now()),
            ],
        )
        .map_err(map_constraint)?;

        if !write.deleted {
            for (name, value) in write.fields {
                tx.execute(
                    "INSERT INTO fields (version, name, value) VALUES (?1, ?2, ?3)",
                    params![version, name, value],
                )?;
            }
        }

        tx.commit()?;
        Ok(Version::new(version))
    }

    fn list_tiddler_heads(&self, bag_id: &str) -> Result<Vec<TiddlerHead>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT bag_id, title, version, is_deleted
             FROM tiddlers WHERE bag_id = ?1 ORDER BY title",
        )?;

        let rows = stmt.query_map(params![bag_id], head_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn list_changes(&self, bag_ids: &[String], since: Version) -> Result<Vec<TiddlerHead>> {
        if bag_ids.is_empty() {
            return Ok(Vec::new());
        }

        let placeholders = (0..bag_ids.len())
            .map(|i| format!("?{}", i + 2))
            .collect::<Vec<_>>()
            .join(", ");
        let sql = format!(
            "SELECT bag_id, title, version, is_deleted
             FROM tiddlers WHERE version > ?1 AND bag_id IN ({placeholders})
             ORDER BY version"
        );

        let since = since.get();
        let mut values: Vec<&dyn ToSql> = Vec::with_capacity(bag_ids.len() + 1);
        values.push(&since);
        for id in bag_ids {
            values.push(id);
        }

        let conn = self.conn();
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt.query_map(values.as_slice(), head_from_row)?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Attachment operations

    fn record_attachment(&self, attachment: &Attachment) -> Result<()> {
        self.conn().execute(
            "INSERT INTO attachments (hash, size, created_at) VALUES (?1, ?2, ?3)
             ON CONFLICT (hash) DO NOTHING",
            params![
                attachment.hash.as_str(),
                attachment.size,
                format_datetime(&attachment.created_at),
            ],
        )?;
        Ok(())
    }

    fn get_attachment(&self, hash: &AttachmentRef) -> Result<Option<Attachment>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT hash, size, created_at FROM attachments WHERE hash = ?1",
            params![hash.as_str()],
            |row| {
                Ok(Attachment {
                    hash: hash.clone(),
                    size: row.get(1)?,
                    created_at: parse_datetime(&row.get::<_, String>(2)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    // Recipe operations

    fn create_recipe(&self, recipe: &Recipe) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        tx.execute(
            "INSERT INTO recipes (id, name, description, owner, skip_required_plugins, skip_core, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                recipe.id,
                recipe.name,
                recipe.description,
                recipe.owner,
                recipe.skip_required_plugins,
                recipe.skip_core,
                format_datetime(&recipe.created_at),
            ],
        )
        .map_err(map_constraint)?;
        replace_plugins(&tx, recipe)?;
        tx.commit()?;
        Ok(())
    }

    fn get_recipe(&self, id: &str) -> Result<Option<Recipe>> {
        let conn = self.conn();
        let recipe = conn
            .query_row(
                "SELECT id, name, description, owner, skip_required_plugins, skip_core, created_at
                 FROM recipes WHERE id = ?1",
                params![id],
                recipe_from_row,
            )
            .optional()?;

        match recipe {
            Some(mut recipe) => {
                load_plugins(&conn, &mut recipe)?;
                Ok(Some(recipe))
            }
            None => Ok(None),
        }
    }

    fn get_recipe_by_name(&self, name: &str) -> Result<Option<Recipe>> {
        let conn = self.conn();
        let recipe = conn
            .query_row(
                "SELECT id, name, description, owner, skip_required_plugins, skip_core, created_at
                 FROM recipes WHERE name = ?1",
                params![name],
                recipe_from_row,
            )
            .optional()?;

        match recipe {
            Some(mut recipe) => {
                load_plugins(&conn, &mut recipe)?;
                Ok(Some(recipe))
            }
            None => Ok(None),
        }
    }

    fn list_recipes(&self) -> Result<Vec<Recipe>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT id, name, description, owner, skip_required_plugins, skip_core, created_at
             FROM recipes ORDER BY name",
        )?;

        let mut recipes = stmt
            .query_map([], recipe_from_row)?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        for recipe in &mut recipes {
            load_plugins(&conn, recipe)?;
        }
        Ok(recipes)
    }

    fn delete_recipe(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM recipes WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Recipe layer operations

    fn set_recipe_layers(&self, recipe_id: &str, layers: &[RecipeLayer]) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction()?;
        replace_layers(&tx, recipe_id, layers)?;
        tx.commit()?;
        Ok(())
    }

    fn replace_recipe(
        &self,
        recipe: &Recipe,
        layers: &[RecipeLayer],
        acl: &[RecipeAcl],
    ) -> Result<()> {
        let mut conn = self.conn();
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        tx.execute(
            "INSERT INTO recipes (id, name, description, owner, skip_required_plugins, skip_core, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
             ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                description = excluded.description,
                owner = excluded.owner,
                skip_required_plugins = excluded.skip_required_plugins,
                skip_core = excluded.skip_core",
            params![
                recipe.id,
                recipe.name,
                recipe.description,
                recipe.owner,
                recipe.skip_required_plugins,
                recipe.skip_core,
                format_datetime(&recipe.created_at),
            ],
        )
        .map_err(map_constraint)?;

        replace_plugins(&tx, recipe)?;
        replace_layers(&tx, &recipe.id, layers)?;
        replace_acl(&tx, &recipe.id, acl)?;

        tx.commit()?;
        Ok(())
    }

    fn list_recipe_stack(&self, recipe_id: &str) -> Result<Vec<StackLayer>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT l.recipe_id, l.bag_id, l.position, l.with_acl, l.load_modules,
                    b.id, b.name, b.description, b.owner, b.created_at
             FROM recipe_layers l
             JOIN bags b ON b.id = l.bag_id
             WHERE l.recipe_id = ?1
             ORDER BY l.position, l.bag_id",
        )?;

        let rows = stmt.query_map(params![recipe_id], |row| {
            Ok(StackLayer {
                layer: RecipeLayer {
                    recipe_id: row.get(0)?,
                    bag_id: row.get(1)?,
                    position: row.get(2)?,
                    with_acl: row.get(3)?,
                    load_modules: row.get(4)?,
                },
                bag: bag_from_row(row, 5)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Role operations

    fn create_role(&self, role: &Role) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO roles (id, name, description) VALUES (?1, ?2, ?3)",
                params![role.id, role.name, role.description],
            )
            .map_err(map_constraint)?;
        Ok(())
    }

    fn get_role(&self, id: &str) -> Result<Option<Role>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, description FROM roles WHERE id = ?1",
            params![id],
            |row| {
                Ok(Role {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_role_by_name(&self, name: &str) -> Result<Option<Role>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, name, description FROM roles WHERE name = ?1",
            params![name],
            |row| {
                Ok(Role {
                    id: row.get(0)?,
                    name: row.get(1)?,
                    description: row.get(2)?,
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn delete_role(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM roles WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    fn add_user_role(&self, user_id: &str, role_id: &str) -> Result<()> {
        self.conn()
            .execute(
                "INSERT OR IGNORE INTO user_roles (user_id, role_id) VALUES (?1, ?2)",
                params![user_id, role_id],
            )
            .map_err(map_constraint)?;
        Ok(())
    }

    fn remove_user_role(&self, user_id: &str, role_id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM user_roles WHERE user_id = ?1 AND role_id = ?2",
            params![user_id, role_id],
        )?;
        Ok(rows > 0)
    }

    fn list_user_role_ids(&self, user_id: &str) -> Result<Vec<String>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT role_id FROM user_roles WHERE user_id = ?1 ORDER BY role_id")?;

        let rows = stmt.query_map(params![user_id], |row| row.get(0))?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // User operations

    fn create_user(&self, user: &User) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO users (id, username, email, password, created_at, last_login)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    user.id,
                    user.username,
                    user.email,
                    user.password,
                    format_datetime(&user.created_at),
                    user.last_login.as_ref().map(format_datetime),
                ],
            )
            .map_err(map_constraint)?;
        Ok(())
    }

    fn get_user(&self, id: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, username, email, password, created_at, last_login
             FROM users WHERE id = ?1",
            params![id],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, username, email, password, created_at, last_login
             FROM users WHERE username = ?1",
            params![username],
            user_from_row,
        )
        .optional()
        .map_err(Error::from)
    }

    fn update_user_last_login(&self, id: &str) -> Result<()> {
        let rows = self.conn().execute(
            "UPDATE users SET last_login = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;

        if rows == 0 {
            return Err(Error::NotFound);
        }
        Ok(())
    }

    fn delete_user(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM users WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Session operations

    fn create_session(&self, session: &Session) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO sessions (id, user_id, session_key, created_at, last_accessed)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    session.id,
                    session.user_id,
                    session.session_key,
                    format_datetime(&session.created_at),
                    format_datetime(&session.last_accessed),
                ],
            )
            .map_err(map_constraint)?;
        Ok(())
    }

    fn get_session_by_key(&self, key: &str) -> Result<Option<Session>> {
        let conn = self.conn();
        conn.query_row(
            "SELECT id, user_id, session_key, created_at, last_accessed
             FROM sessions WHERE session_key = ?1",
            params![key],
            |row| {
                Ok(Session {
                    id: row.get(0)?,
                    user_id: row.get(1)?,
                    session_key: row.get(2)?,
                    created_at: parse_datetime(&row.get::<_, String>(3)?),
                    last_accessed: parse_datetime(&row.get::<_, String>(4)?),
                })
            },
        )
        .optional()
        .map_err(Error::from)
    }

    fn touch_session(&self, id: &str) -> Result<()> {
        self.conn().execute(
            "UPDATE sessions SET last_accessed = ?1 WHERE id = ?2",
            params![format_datetime(&Utc::now()), id],
        )?;
        Ok(())
    }

    fn delete_session(&self, id: &str) -> Result<bool> {
        let rows = self
            .conn()
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])?;
        Ok(rows > 0)
    }

    // Recipe ACL operations

    fn upsert_recipe_acl(&self, acl: &RecipeAcl) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO recipe_acl (role_id, recipe_id, permission)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (role_id, recipe_id) DO UPDATE SET
                    permission = excluded.permission",
                params![acl.role_id, acl.recipe_id, i64::from(acl.permission)],
            )
            .map_err(map_constraint)?;
        Ok(())
    }

    fn delete_recipe_acl(&self, role_id: &str, recipe_id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM recipe_acl WHERE role_id = ?1 AND recipe_id = ?2",
            params![role_id, recipe_id],
        )?;
        Ok(rows > 0)
    }

    fn list_recipe_acl(&self, recipe_id: &str) -> Result<Vec<RecipeAcl>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT role_id, recipe_id, permission
             FROM recipe_acl WHERE recipe_id = ?1 ORDER BY role_id",
        )?;

        let rows = stmt.query_map(params![recipe_id], |row| {
            Ok(RecipeAcl {
                role_id: row.get(0)?,
                recipe_id: row.get(1)?,
                permission: permission_column(row, 2)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    // Bag ACL operations

    fn upsert_bag_acl(&self, acl: &BagAcl) -> Result<()> {
        self.conn()
            .execute(
                "INSERT INTO bag_acl (role_id, bag_id, permission)
                 VALUES (?1, ?2, ?3)
                 ON CONFLICT (role_id, bag_id) DO UPDATE SET
                    permission = excluded.permission",
                params![acl.role_id, acl.bag_id, i64::from(acl.permission)],
            )
            .map_err(map_constraint)?;
        Ok(())
    }

    fn delete_bag_acl(&self, role_id: &str, bag_id: &str) -> Result<bool> {
        let rows = self.conn().execute(
            "DELETE FROM bag_acl WHERE role_id = ?1 AND bag_id = ?2",
            params![role_id, bag_id],
        )?;
        Ok(rows > 0)
    }

    fn list_bag_acl(&self, bag_id: &str) -> Result<Vec<BagAcl>> {
        let conn = self.conn();
        let mut stmt = conn.prepare(
            "SELECT role_id, bag_id, permission
             FROM bag_acl WHERE bag_id = ?1 ORDER BY role_id",
        )?;

        let rows = stmt.query_map(params![bag_id], |row| {
            Ok(BagAcl {
                role_id: row.get(0)?,
                bag_id: row.get(1)?,
                permission: permission_column(row, 2)?,
            })
        })?;

        rows.collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::from)
    }

    fn close(&self) -> Result<()> {
        Ok(())
    }
}
