use super::{Listing, Services, client_error, created, record_id};
use crate::entity::{STATUS_ENABLED, User};
use tikilive_core::{Container, Controller, Error, HandlerOutput, HandlerResult, ParameterBag, Result};
use tracing::debug;

/// `/users` and `/users/:id`
pub struct UsersController {
    services: Services,
}

impl UsersController {
    pub fn from_container(container: &Container) -> Result<Self> {
        Ok(Self {
            services: Services::resolve(container)?,
        })
    }

    fn find(&self, id: Option<u64>) -> Result<Option<User>> {
        match id {
            Some(id) => self.services.users.find_by_id(id),
            None => Ok(None),
        }
    }
}

impl Controller for UsersController {
    fn get(&self, params: &ParameterBag) -> HandlerResult {
        if params.param("id").is_some() {
            let user = self
                .find(record_id(params))?
                .ok_or_else(|| Error::not_found("User does not exist."))?;
            if user.is_disabled() {
                return Err(Error::not_found("User is no longer available."));
            }
            return HandlerOutput::serialize(&user);
        }

        let listing = Listing::from_params(params, &self.services.settings)?;
        let users = self
            .services
            .users
            .find_all_active(&listing.page())
            .map_err(client_error)?;
        let total = self.services.users.count_all_active()?;

        let items = users.iter().map(User::summary).collect();
        Ok(listing.respond(items, total).into())
    }

    fn create(&self, params: &ParameterBag) -> HandlerResult {
        let user = User::new(
            params.post("username").unwrap_or_default(),
            params.post("email").unwrap_or_default(),
            params.post("status").unwrap_or(STATUS_ENABLED),
        );

        let id = self.services.users.insert(user).map_err(client_error)?;
        debug!(user = id, "User created");

        Ok(created(id, self.services.resource_url("users", id)).into())
    }

    fn update(&self, params: &ParameterBag) -> HandlerResult {
        let mut user = self
            .find(record_id(params))?
            .ok_or_else(|| Error::not_found("User was not found."))?;

        if let Some(username) = params.post("username") {
            user.username = username.to_string();
        }
        if let Some(email) = params.post("email") {
            user.email = email.to_string();
        }
        if let Some(status) = params.post("status") {
            user.status = status.to_string();
        }

        self.services.users.update(&user).map_err(client_error)?;
        Ok(HandlerOutput::empty())
    }

    fn delete(&self, params: &ParameterBag) -> HandlerResult {
        let user = self
            .find(record_id(params))?
            .ok_or_else(|| Error::not_found("User was not found."))?;
        self.services.users.delete(user.id)?;
        Ok(HandlerOutput::empty())
    }
}
