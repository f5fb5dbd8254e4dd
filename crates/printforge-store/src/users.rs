use async_trait::async_trait;
use printforge_core::{PrintForgeError, Result, User, UserId, UserStore};
use uuid::Uuid;

use crate::db::{email_index_key, StoreDb, USERS_CF};

#[async_trait]
impl UserStore for StoreDb {
    async fn create_user(&self, user: User) -> Result<()> {
        if self.get_index(&email_index_key(&user.email))?.is_some() {
            return Err(PrintForgeError::InvalidOperation(format!(
                "email '{}' is already registered",
                user.email
            )));
        }
        self.put_with_indices(
            USERS_CF,
            user.id.as_bytes(),
            &user,
            &[(email_index_key(&user.email), user.id.as_bytes().to_vec())],
            &[],
        )
    }

    async fn get_user(&self, id: UserId) -> Result<Option<User>> {
        self.get_record(USERS_CF, id.as_bytes())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        match self.get_index(&email_index_key(email))? {
            Some(id_bytes) => {
                let id = Uuid::from_slice(&id_bytes)
                    .map_err(|_| PrintForgeError::Storage("corrupt email index".into()))?;
                self.get_user(id).await
            }
            None => Ok(None),
        }
    }
}
