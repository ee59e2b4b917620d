//! Task template entity store.
//!
//! Templates share the ordering and write-then-publish pattern of the other
//! kinds; the one extra rule is that `updated_at` is refreshed from the
//! clock on every mutation.

use crate::model::template::{Template, TemplateId};
use crate::model::validate_name;
use crate::ordering::{move_item, next_order};
use crate::repo::template_repo::{TemplatePatch, TemplateRepository};
use crate::store::{
    persistence_error, Clock, StoreError, StoreResult, StoreState, Subscribers, SubscriptionId,
    SystemClock,
};
use log::info;

/// Fields that plain `update` may touch.
#[derive(Debug, Clone, Default)]
pub struct TemplateUpdate {
    pub name: Option<String>,
    /// `Some(None)` clears the notes.
    pub notes: Option<Option<String>>,
}

/// Stateful store for the template collection.
pub struct TemplateStore<R: TemplateRepository> {
    repo: R,
    clock: Box<dyn Clock>,
    state: StoreState,
    templates: Vec<Template>,
    subscribers: Subscribers<Template>,
}

impl<R: TemplateRepository> TemplateStore<R> {
    pub fn new(repo: R) -> Self {
        Self::with_clock(repo, Box::new(SystemClock))
    }

    pub fn with_clock(repo: R, clock: Box<dyn Clock>) -> Self {
        Self {
            repo,
            clock,
            state: StoreState::Uninitialized,
            templates: Vec::new(),
            subscribers: Subscribers::new(),
        }
    }

    /// Bulk-loads the collection from durable storage and becomes `Ready`.
    pub fn init(&mut self) -> StoreResult<()> {
        if self.state == StoreState::Ready {
            return Ok(());
        }

        self.state = StoreState::Loading;
        let loaded = match self.repo.load_all() {
            Ok(loaded) => loaded,
            Err(err) => {
                self.state = StoreState::Uninitialized;
                return Err(persistence_error("template_load")(err));
            }
        };

        info!(
            "event=template_load module=store status=ok count={}",
            loaded.len()
        );
        self.state = StoreState::Ready;
        self.commit(loaded);
        Ok(())
    }

    pub fn state(&self) -> StoreState {
        self.state
    }

    pub fn is_loading(&self) -> bool {
        self.state != StoreState::Ready
    }

    /// Read-only snapshot sorted by `order` ascending.
    pub fn templates(&self) -> &[Template] {
        &self.templates
    }

    pub fn subscribe(&mut self, callback: Box<dyn Fn(&[Template])>) -> SubscriptionId {
        self.subscribers.add(callback)
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        self.subscribers.remove(id)
    }

    /// Creates a new template appended at the end of the list.
    pub fn create(&mut self, name: &str, notes: Option<String>) -> StoreResult<TemplateId> {
        self.ensure_ready()?;
        validate_name("template", name)?;

        let mut template = Template::new(name.trim(), notes, self.clock.now());
        template.order = next_order(&self.templates);
        let id = template.id;

        self.repo
            .upsert(&template)
            .map_err(persistence_error("template_create"))?;

        info!("event=template_create module=store status=ok id={id}");
        let mut next = self.templates.clone();
        next.push(template);
        self.commit(next);
        Ok(id)
    }

    /// Merges name/notes changes into an existing template.
    pub fn update(&mut self, id: TemplateId, update: TemplateUpdate) -> StoreResult<()> {
        self.ensure_ready()?;
        let mut template = self.require(id)?.clone();
        let now = self.clock.now();

        let mut patch = TemplatePatch {
            updated_at: Some(now),
            ..TemplatePatch::default()
        };
        if let Some(name) = update.name {
            validate_name("template", &name)?;
            let trimmed = name.trim().to_string();
            template.name = trimmed.clone();
            patch.name = Some(trimmed);
        }
        if let Some(notes) = update.notes {
            template.notes = notes.clone();
            patch.notes = Some(notes);
        }
        template.updated_at = now;

        self.repo
            .patch(id, &patch)
            .map_err(persistence_error("template_update"))?;
        let next = self.merged_with(&template);
        self.commit(next);
        Ok(())
    }

    /// Moves a template from one position to another and renumbers the whole
    /// collection, persisting it as one batch.
    pub fn reorder(&mut self, from_index: usize, to_index: usize) -> StoreResult<()> {
        self.ensure_ready()?;
        let now = self.clock.now();
        let mut sorted = self.templates.clone();
        sorted.sort_by_key(|template| template.order);
        let mut renumbered = move_item(sorted, from_index, to_index)?;
        for template in &mut renumbered {
            template.updated_at = now;
        }

        self.repo
            .upsert_many(&renumbered)
            .map_err(persistence_error("template_reorder"))?;

        info!("event=template_reorder module=store status=ok from={from_index} to={to_index}");
        self.commit(renumbered);
        Ok(())
    }

    /// Removes a template from memory and durable storage.
    pub fn delete(&mut self, id: TemplateId) -> StoreResult<()> {
        self.ensure_ready()?;
        self.require(id)?;

        self.repo
            .remove(id)
            .map_err(persistence_error("template_delete"))?;

        info!("event=template_delete module=store status=ok id={id}");
        let next: Vec<Template> = self
            .templates
            .iter()
            .filter(|template| template.id != id)
            .cloned()
            .collect();
        self.commit(next);
        Ok(())
    }

    fn ensure_ready(&self) -> StoreResult<()> {
        if self.state != StoreState::Ready {
            return Err(StoreError::NotReady);
        }
        Ok(())
    }

    fn require(&self, id: TemplateId) -> StoreResult<&Template> {
        self.templates
            .iter()
            .find(|template| template.id == id)
            .ok_or(StoreError::NotFound(id))
    }

    fn merged_with(&self, updated: &Template) -> Vec<Template> {
        let mut next = self.templates.clone();
        if let Some(slot) = next.iter_mut().find(|existing| existing.id == updated.id) {
            *slot = updated.clone();
        }
        next
    }

    fn commit(&mut self, next: Vec<Template>) {
        self.templates = next;
        self.subscribers.notify(&self.templates);
    }
}
