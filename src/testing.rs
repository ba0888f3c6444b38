//! In-memory stand-ins for the database and the public directory.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Mutex,
};

use axum::async_trait;
use bytes::Bytes;
use time::OffsetDateTime;
use uuid::Uuid;

use crate::{
    accounts::{
        repo::UserStore,
        repo_types::{NewUser, User, UserChanges},
    },
    storage::StorageClient,
};

#[derive(Default)]
pub struct MemoryUserStore {
    rows: Mutex<Vec<User>>,
    broken: AtomicBool,
}

impl MemoryUserStore {
    /// Makes every following call fail like a lost connection.
    pub fn break_connection(&self) {
        self.broken.store(true, Ordering::SeqCst);
    }

    /// Inserts or overwrites a row, bypassing the account handlers.
    pub fn put(&self, user: User) {
        let mut rows = self.rows.lock().unwrap();
        rows.retain(|u| u.id != user.id);
        rows.push(user);
    }

    pub fn get(&self, id: Uuid) -> Option<User> {
        self.rows.lock().unwrap().iter().find(|u| u.id == id).cloned()
    }

    pub fn by_username(&self, username: &str) -> Option<User> {
        self.rows
            .lock()
            .unwrap()
            .iter()
            .find(|u| u.username == username)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    fn check(&self) -> anyhow::Result<()> {
        if self.broken.load(Ordering::SeqCst) {
            anyhow::bail!("connection refused");
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, new: NewUser) -> anyhow::Result<User> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        if rows.iter().any(|u| u.username == new.username) {
            anyhow::bail!("duplicate key value violates unique constraint \"users_username_key\"");
        }
        let user = User {
            id: Uuid::new_v4(),
            username: new.username,
            email: new.email,
            password_hash: new.password_hash,
            image_url: new.image_url,
            is_admin: false,
            created_at: OffsetDateTime::now_utc(),
        };
        rows.push(user.clone());
        Ok(user)
    }

    async fn find_by_id(&self, id: Uuid) -> anyhow::Result<Option<User>> {
        self.check()?;
        Ok(self.get(id))
    }

    async fn find_by_username(&self, username: &str) -> anyhow::Result<Option<User>> {
        self.check()?;
        Ok(self.by_username(username))
    }

    async fn list(&self) -> anyhow::Result<Vec<User>> {
        self.check()?;
        Ok(self.rows.lock().unwrap().clone())
    }

    async fn update(&self, id: Uuid, changes: &UserChanges) -> anyhow::Result<Option<User>> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        let Some(row) = rows.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };
        row.username = changes.username.clone();
        row.email = changes.email.clone();
        row.password_hash = changes.password_hash.clone();
        row.image_url = changes.image_url.clone();
        Ok(Some(row.clone()))
    }

    async fn delete(&self, id: Uuid) -> anyhow::Result<u64> {
        self.check()?;
        let mut rows = self.rows.lock().unwrap();
        let before = rows.len();
        rows.retain(|u| u.id != id);
        Ok((before - rows.len()) as u64)
    }
}

/// Records every key written or deleted.
#[derive(Default)]
pub struct RecordingStorage {
    puts: Mutex<Vec<String>>,
    deletes: Mutex<Vec<String>>,
    fail_deletes: bool,
}

impl RecordingStorage {
    pub fn failing_deletes() -> Self {
        Self {
            fail_deletes: true,
            ..Self::default()
        }
    }

    pub fn puts(&self) -> Vec<String> {
        self.puts.lock().unwrap().clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.deletes.lock().unwrap().clone()
    }
}

#[async_trait]
impl StorageClient for RecordingStorage {
    async fn put_object(&self, key: &str, _body: Bytes, _content_type: &str) -> anyhow::Result<()> {
        self.puts.lock().unwrap().push(key.to_string());
        Ok(())
    }

    async fn delete_object(&self, key: &str) -> anyhow::Result<()> {
        self.deletes.lock().unwrap().push(key.to_string());
        if self.fail_deletes {
            anyhow::bail!("permission denied");
        }
        Ok(())
    }
}
