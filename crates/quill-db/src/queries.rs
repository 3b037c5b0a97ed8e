use rusqlite::{Connection, OptionalExtension, Row, ffi};

use crate::error::constraint_violation;
use crate::models::{FeedbackRow, NewUser, UserRow};
use crate::{Database, Result, StoreError};

impl Database {
    // -- Users --

    /// Insert a user. A taken username surfaces as
    /// [`StoreError::DuplicateUsername`], not as a raw constraint error.
    pub fn create_user(&self, user: &NewUser<'_>) -> Result<UserRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO users (username, password, email, first_name, last_name)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (
                    user.username,
                    user.password_hash,
                    user.email,
                    user.first_name,
                    user.last_name,
                ),
            )
            .map_err(|e| match constraint_violation(&e) {
                Some(ffi::SQLITE_CONSTRAINT_PRIMARYKEY | ffi::SQLITE_CONSTRAINT_UNIQUE) => {
                    StoreError::DuplicateUsername(user.username.to_string())
                }
                _ => e.into(),
            })?;

            Ok(UserRow {
                username: user.username.to_string(),
                password: user.password_hash.to_string(),
                email: user.email.to_string(),
                first_name: user.first_name.to_string(),
                last_name: user.last_name.to_string(),
            })
        })
    }

    pub fn find_user(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, username))
    }

    /// Delete a user and, through `ON DELETE CASCADE`, all of their feedback.
    /// Returns false if no such user existed.
    pub fn delete_user(&self, username: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute("DELETE FROM users WHERE username = ?1", [username])?;
            Ok(removed > 0)
        })
    }

    // -- Feedback --

    pub fn create_feedback(&self, username: &str, title: &str, content: &str) -> Result<FeedbackRow> {
        self.with_conn_mut(|conn| {
            conn.execute(
                "INSERT INTO feedback (title, content, username) VALUES (?1, ?2, ?3)",
                (title, content, username),
            )
            .map_err(|e| match constraint_violation(&e) {
                Some(ffi::SQLITE_CONSTRAINT_FOREIGNKEY) => {
                    StoreError::UnknownUser(username.to_string())
                }
                _ => e.into(),
            })?;

            Ok(FeedbackRow {
                id: conn.last_insert_rowid(),
                title: title.to_string(),
                content: content.to_string(),
                username: username.to_string(),
            })
        })
    }

    pub fn find_feedback(&self, id: i64) -> Result<Option<FeedbackRow>> {
        self.with_conn(|conn| {
            let row = conn
                .query_row(
                    "SELECT id, title, content, username FROM feedback WHERE id = ?1",
                    [id],
                    feedback_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    /// All feedback owned by `username`, oldest first.
    pub fn feedback_for_user(&self, username: &str) -> Result<Vec<FeedbackRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, title, content, username FROM feedback
                 WHERE username = ?1
                 ORDER BY id",
            )?;

            let rows = stmt
                .query_map([username], feedback_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;

            Ok(rows)
        })
    }

    /// Replace title and content. Id and owner are never touched.
    pub fn update_feedback(&self, id: i64, title: &str, content: &str) -> Result<Option<FeedbackRow>> {
        self.with_conn_mut(|conn| {
            let row = conn
                .query_row(
                    "UPDATE feedback SET title = ?1, content = ?2 WHERE id = ?3
                     RETURNING id, title, content, username",
                    (title, content, id),
                    feedback_from_row,
                )
                .optional()?;
            Ok(row)
        })
    }

    pub fn delete_feedback(&self, id: i64) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let removed = conn.execute("DELETE FROM feedback WHERE id = ?1", [id])?;
            Ok(removed > 0)
        })
    }
}

fn query_user(conn: &Connection, username: &str) -> Result<Option<UserRow>> {
    let mut stmt = conn.prepare(
        "SELECT username, password, email, first_name, last_name FROM users WHERE username = ?1",
    )?;

    let row = stmt
        .query_row([username], |row| {
            Ok(UserRow {
                username: row.get(0)?,
                password: row.get(1)?,
                email: row.get(2)?,
                first_name: row.get(3)?,
                last_name: row.get(4)?,
            })
        })
        .optional()?;

    Ok(row)
}

fn feedback_from_row(row: &Row<'_>) -> rusqlite::Result<FeedbackRow> {
    Ok(FeedbackRow {
        id: row.get(0)?,
        title: row.get(1)?,
        content: row.get(2)?,
        username: row.get(3)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn new_user(username: &str) -> NewUser<'_> {
        NewUser {
            username,
            password_hash: "$argon2id$not-a-real-hash",
            email: "someone@example.com",
            first_name: "Some",
            last_name: "One",
        }
    }

    fn user_count(db: &Database) -> i64 {
        db.with_conn(|conn| Ok(conn.query_row("SELECT COUNT(*) FROM users", [], |r| r.get(0))?))
            .unwrap()
    }

    #[test]
    fn duplicate_username_is_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&new_user("alice")).unwrap();

        let err = db.create_user(&new_user("alice")).err().unwrap();
        assert!(matches!(err, StoreError::DuplicateUsername(ref name) if name == "alice"));
        assert_eq!(user_count(&db), 1);
    }

    #[test]
    fn find_user_returns_none_for_unknown() {
        let db = Database::open_in_memory().unwrap();
        assert!(db.find_user("ghost").unwrap().is_none());

        db.create_user(&new_user("alice")).unwrap();
        let row = db.find_user("alice").unwrap().unwrap();
        assert_eq!(row.email, "someone@example.com");
    }

    #[test]
    fn feedback_requires_existing_owner() {
        let db = Database::open_in_memory().unwrap();
        let err = db.create_feedback("ghost", "t", "c").err().unwrap();
        assert!(matches!(err, StoreError::UnknownUser(ref name) if name == "ghost"));
    }

    #[test]
    fn deleting_user_cascades_to_feedback() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&new_user("alice")).unwrap();
        db.create_user(&new_user("bob")).unwrap();

        let a1 = db.create_feedback("alice", "one", "first").unwrap();
        let a2 = db.create_feedback("alice", "two", "second").unwrap();
        let b1 = db.create_feedback("bob", "three", "third").unwrap();

        assert!(db.delete_user("alice").unwrap());
        assert!(db.find_feedback(a1.id).unwrap().is_none());
        assert!(db.find_feedback(a2.id).unwrap().is_none());
        assert!(db.find_feedback(b1.id).unwrap().is_some());
        assert!(!db.delete_user("alice").unwrap());
    }

    #[test]
    fn update_keeps_id_and_owner() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&new_user("alice")).unwrap();
        let created = db.create_feedback("alice", "title", "content").unwrap();

        let updated = db
            .update_feedback(created.id, "new title", "new content")
            .unwrap()
            .unwrap();
        assert_eq!(updated.id, created.id);
        assert_eq!(updated.username, "alice");
        assert_eq!(updated.title, "new title");
        assert_eq!(updated.content, "new content");

        assert!(db.update_feedback(created.id + 100, "x", "y").unwrap().is_none());
    }

    #[test]
    fn feedback_for_user_lists_only_owned_rows_in_order() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&new_user("alice")).unwrap();
        db.create_user(&new_user("bob")).unwrap();
        db.create_feedback("alice", "first", "1").unwrap();
        db.create_feedback("bob", "other", "2").unwrap();
        db.create_feedback("alice", "second", "3").unwrap();

        let titles: Vec<String> = db
            .feedback_for_user("alice")
            .unwrap()
            .into_iter()
            .map(|f| f.title)
            .collect();
        assert_eq!(titles, ["first", "second"]);
    }

    #[test]
    fn delete_feedback_reports_missing_rows() {
        let db = Database::open_in_memory().unwrap();
        db.create_user(&new_user("alice")).unwrap();
        let f = db.create_feedback("alice", "t", "c").unwrap();

        assert!(db.delete_feedback(f.id).unwrap());
        assert!(!db.delete_feedback(f.id).unwrap());
    }
}
