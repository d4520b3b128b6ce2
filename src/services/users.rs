use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::oneshot;

use super::{RequestHandler, Service, ServiceError};
use crate::{
    models::users::{self, NewUser, User},
    repositories::{documents::DocumentStore, users::UserRepository},
};

const SERVICE: &str = "UserService";

pub enum UserRequest {
    CreateUser {
        new_user: NewUser,
        response: oneshot::Sender<Result<User, ServiceError>>,
    },
    GetUser {
        id: String,
        response: oneshot::Sender<Result<Option<User>, ServiceError>>,
    },
    DeactivateUser {
        id: String,
        response: oneshot::Sender<Result<(), ServiceError>>,
    },
}

#[derive(Clone)]
pub struct UserRequestHandler {
    repository: UserRepository,
}

impl UserRequestHandler {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        let repository = UserRepository::new(store);

        UserRequestHandler { repository }
    }

    async fn create_user(&self, new_user: NewUser) -> Result<User, ServiceError> {
        let user = self
            .repository
            .insert_user(new_user)
            .await
            .map_err(|e| ServiceError::from_repository(SERVICE, e))?;

        log::info!("Created user {}.", user.id);
        Ok(user)
    }

    async fn get_user(&self, id: &str) -> Result<Option<User>, ServiceError> {
        self.repository
            .get_user_by_id(id)
            .await
            .map_err(|e| ServiceError::from_repository(SERVICE, e))
    }

    async fn deactivate_user(&self, id: &str) -> Result<(), ServiceError> {
        match self.repository.get_user_by_id(id).await {
            Ok(Some(_)) => self
                .repository
                .deactivate_user(id)
                .await
                .map_err(|e| ServiceError::from_repository(SERVICE, e)),
            Ok(None) => Err(ServiceError::NotFound(format!("{}/{}", users::COLLECTION, id))),
            Err(e) => Err(ServiceError::from_repository(SERVICE, e)),
        }
    }
}

#[async_trait]
impl RequestHandler<UserRequest> for UserRequestHandler {
    async fn handle_request(&self, request: UserRequest) {
        match request {
            UserRequest::CreateUser { new_user, response } => {
                let user = self.create_user(new_user).await;
                let _ = response.send(user);
            }
            UserRequest::GetUser { id, response } => {
                let user = self.get_user(&id).await;
                let _ = response.send(user);
            }
            UserRequest::DeactivateUser { id, response } => {
                let result = self.deactivate_user(&id).await;
                let _ = response.send(result);
            }
        }
    }
}

pub struct UserService;

impl UserService {
    pub fn new() -> Self {
        UserService {}
    }
}

#[async_trait]
impl Service<UserRequest, UserRequestHandler> for UserService {}
