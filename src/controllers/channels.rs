use super::{Listing, Services, client_error, created, record_id};
use crate::entity::Channel;
use crate::entity::channel::PUBLISHED;
use crate::entity::STATUS_ENABLED;
use tikilive_core::{Container, Controller, Error, HandlerOutput, HandlerResult, ParameterBag, Result};
use tracing::debug;

/// `/channels` and `/channels/:id`
pub struct ChannelsController {
    services: Services,
}

impl ChannelsController {
    pub fn from_container(container: &Container) -> Result<Self> {
        Ok(Self {
            services: Services::resolve(container)?,
        })
    }

    fn list(&self, params: &ParameterBag) -> HandlerResult {
        let listing = Listing::from_params(params, &self.services.settings)?;
        let channels = self
            .services
            .channels
            .find_all_active(&listing.page())
            .map_err(client_error)?;

        let mut items = Vec::with_capacity(channels.len());
        for channel in &channels {
            let owner = self.services.users.find_by_id(channel.user_id)?;
            items.push(channel.summary(owner.as_ref()));
        }

        let total = self.services.channels.count_all_active()?;
        Ok(listing.respond(items, total).into())
    }

    fn show(&self, id: Option<u64>) -> HandlerResult {
        let channel = self.find(id)?;
        if channel.is_disabled() {
            return Err(Error::not_found("Channel is no longer available."));
        }

        let owner = self.services.users.find_by_id(channel.user_id)?;
        Ok(channel.to_value(owner.as_ref()).into())
    }

    fn find(&self, id: Option<u64>) -> Result<Channel> {
        let channel = match id {
            Some(id) => self.services.channels.find_by_id(id)?,
            None => None,
        };
        channel.ok_or_else(|| Error::not_found("Channel does not exist."))
    }
}

impl Controller for ChannelsController {
    fn get(&self, params: &ParameterBag) -> HandlerResult {
        match params.param("id") {
            Some(_) => self.show(record_id(params)),
            None => self.list(params),
        }
    }

    fn create(&self, params: &ParameterBag) -> HandlerResult {
        let owner = match params.post("user_id").and_then(|id| id.parse::<u64>().ok()) {
            Some(id) => self.services.users.find_by_id(id)?,
            None => None,
        };
        let owner = owner.ok_or_else(|| Error::not_found("User does not exist."))?;

        let channel = Channel::new(owner.id, params.post("name").unwrap_or_default())
            .with_description(params.post("description").unwrap_or_default())
            .with_status(params.post("status").unwrap_or(STATUS_ENABLED))
            .with_published(params.post("published").unwrap_or(PUBLISHED));

        let id = self.services.channels.insert(channel).map_err(client_error)?;
        debug!(channel = id, user = owner.id, "Channel created");

        Ok(created(id, self.services.resource_url("channels", id)).into())
    }

    fn update(&self, params: &ParameterBag) -> HandlerResult {
        let mut channel = self.find(record_id(params))?;

        if let Some(name) = params.post("name") {
            channel.rename(name);
        }
        if let Some(description) = params.post("description") {
            channel.description = description.to_string();
        }
        if let Some(status) = params.post("status") {
            channel.status = status.to_string();
        }
        if let Some(published) = params.post("published") {
            channel.published = published.to_string();
        }

        self.services.channels.update(&channel).map_err(client_error)?;
        Ok(HandlerOutput::empty())
    }

    fn delete(&self, params: &ParameterBag) -> HandlerResult {
        let channel = self.find(record_id(params))?;
        self.services.channels.delete(channel.id)?;
        Ok(HandlerOutput::empty())
    }
}
