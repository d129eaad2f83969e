//! In-memory gateway for scenario tests.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use indexmap::IndexMap;

use crate::error::{GatewayError, Result};

use super::api::ProvisioningGateway;
use super::types::{
    ChangePreview, DeleteArgs, Export, Page, ParameterDefinition, PreviewRequest,
    ResolvedParameter, ResourceChange, StackDetail, StackEvent, StackRequest, StackResource,
    StackSummary, TemplateValidation, WaitTarget,
};

/// A gateway call as recorded by [`FakeGateway`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    Create(StackRequest),
    Update(StackRequest),
    Delete(String, DeleteArgs),
    Preview(PreviewRequest),
    Wait(String, WaitTarget),
}

/// Gateway backed by in-memory stacks.
#[derive(Debug, Default)]
pub struct FakeGateway {
    stacks: Mutex<IndexMap<String, StackDetail>>,
    template_parameters: HashMap<String, Vec<ParameterDefinition>>,
    events: HashMap<String, Vec<StackEvent>>,
    resources: HashMap<String, Vec<StackResource>>,
    exports: Vec<Export>,
    changes: Vec<ResourceChange>,
    update_error: Option<String>,
    preview_failure: Option<String>,
    page_size: Option<usize>,
    calls: Mutex<Vec<Call>>,
}

impl FakeGateway {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_stack(self, name: &str, status: &str, parameters: &[(&str, &str)]) -> Self {
        let detail = StackDetail {
            id: Some(format!("arn:aws:cloudformation:us-east-1:123456789012:stack/{name}/1")),
            name: name.to_string(),
            status: status.to_string(),
            status_reason: None,
            description: None,
            created_at: None,
            updated_at: None,
            parameters: parameters
                .iter()
                .map(|(k, v)| ResolvedParameter::new(*k, *v))
                .collect(),
            outputs: Vec::new(),
        };
        self.lock_stacks().insert(name.to_string(), detail);
        self
    }

    pub fn with_template_parameters(
        mut self,
        template_url: &str,
        parameters: Vec<ParameterDefinition>,
    ) -> Self {
        self.template_parameters
            .insert(template_url.to_string(), parameters);
        self
    }

    pub fn with_events(mut self, stack_name: &str, events: Vec<StackEvent>) -> Self {
        self.events.insert(stack_name.to_string(), events);
        self
    }

    pub fn with_resources(mut self, stack_name: &str, resources: Vec<StackResource>) -> Self {
        self.resources.insert(stack_name.to_string(), resources);
        self
    }

    pub fn with_exports(mut self, exports: Vec<Export>) -> Self {
        self.exports = exports;
        self
    }

    pub fn with_changes(mut self, changes: Vec<ResourceChange>) -> Self {
        self.changes = changes;
        self
    }

    pub fn with_update_error(mut self, message: &str) -> Self {
        self.update_error = Some(message.to_string());
        self
    }

    pub fn with_preview_failure(mut self, reason: &str) -> Self {
        self.preview_failure = Some(reason.to_string());
        self
    }

    pub const fn with_page_size(mut self, size: usize) -> Self {
        self.page_size = Some(size);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn mutations(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Create(_) | Call::Update(_) | Call::Delete(..)))
            .collect()
    }

    pub fn stack_exists(&self, name: &str) -> bool {
        self.lock_stacks().contains_key(name)
    }

    fn record(&self, call: Call) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }

    fn lock_stacks(&self) -> std::sync::MutexGuard<'_, IndexMap<String, StackDetail>> {
        match self.stacks.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn missing(stack_name: &str) -> crate::error::StackfabError {
        GatewayError::client(
            Some("ValidationError"),
            format!("Stack with id {stack_name} does not exist"),
        )
        .into()
    }

    fn paginate<T: Clone>(&self, items: &[T], token: Option<String>) -> Page<T> {
        let start = token.and_then(|t| t.parse::<usize>().ok()).unwrap_or(0);
        let size = self.page_size.unwrap_or(usize::MAX);
        let end = start.saturating_add(size).min(items.len());
        let next_token = (end < items.len()).then(|| end.to_string());
        Page {
            items: items[start.min(end)..end].to_vec(),
            next_token,
        }
    }
}

#[async_trait]
impl ProvisioningGateway for FakeGateway {
    async fn create_stack(&self, request: &StackRequest) -> Result<()> {
        self.record(Call::Create(request.clone()));
        let mut stacks = self.lock_stacks();
        if stacks.contains_key(&request.stack_name) {
            return Err(GatewayError::client(
                Some("AlreadyExistsException"),
                format!("Stack [{}] already exists", request.stack_name),
            )
            .into());
        }
        stacks.insert(
            request.stack_name.clone(),
            StackDetail {
                id: None,
                name: request.stack_name.clone(),
                status: String::from("CREATE_COMPLETE"),
                status_reason: None,
                description: None,
                created_at: None,
                updated_at: None,
                parameters: request.parameters.clone(),
                outputs: Vec::new(),
            },
        );
        Ok(())
    }

    async fn update_stack(&self, request: &StackRequest) -> Result<()> {
        self.record(Call::Update(request.clone()));
        if let Some(message) = &self.update_error {
            return Err(GatewayError::client(Some("ValidationError"), message.clone()).into());
        }
        let mut stacks = self.lock_stacks();
        let stack = stacks
            .get_mut(&request.stack_name)
            .ok_or_else(|| Self::missing(&request.stack_name))?;
        stack.parameters.clone_from(&request.parameters);
        stack.status = String::from("UPDATE_COMPLETE");
        Ok(())
    }

    async fn delete_stack(&self, stack_name: &str, args: &DeleteArgs) -> Result<()> {
        self.record(Call::Delete(stack_name.to_string(), args.clone()));
        self.lock_stacks().shift_remove(stack_name);
        Ok(())
    }

    async fn describe_stack(&self, stack_name: &str) -> Result<Option<StackDetail>> {
        Ok(self.lock_stacks().get(stack_name).cloned())
    }

    async fn list_stacks(
        &self,
        statuses: &[&'static str],
        next_token: Option<String>,
    ) -> Result<Page<StackSummary>> {
        let summaries: Vec<StackSummary> = self
            .lock_stacks()
            .values()
            .filter(|s| statuses.contains(&s.status.as_str()))
            .map(|s| StackSummary {
                name: s.name.clone(),
                status: s.status.clone(),
                created_at: s.created_at,
                updated_at: s.updated_at,
                description: s.description.clone(),
            })
            .collect();
        Ok(self.paginate(&summaries, next_token))
    }

    async fn list_stack_resources(
        &self,
        stack_name: &str,
        next_token: Option<String>,
    ) -> Result<Page<StackResource>> {
        if !self.stack_exists(stack_name) {
            return Err(Self::missing(stack_name));
        }
        let resources = self.resources.get(stack_name).cloned().unwrap_or_default();
        Ok(self.paginate(&resources, next_token))
    }

    async fn list_stack_events(
        &self,
        stack_name: &str,
        next_token: Option<String>,
    ) -> Result<Page<StackEvent>> {
        if !self.stack_exists(stack_name) {
            return Err(Self::missing(stack_name));
        }
        let events = self.events.get(stack_name).cloned().unwrap_or_default();
        Ok(self.paginate(&events, next_token))
    }

    async fn list_exports(&self, next_token: Option<String>) -> Result<Page<Export>> {
        Ok(self.paginate(&self.exports, next_token))
    }

    async fn get_template_parameters(&self, template_url: &str) -> Result<Vec<ParameterDefinition>> {
        Ok(self
            .template_parameters
            .get(template_url)
            .cloned()
            .unwrap_or_default())
    }

    async fn validate_template(&self, template_url: &str) -> Result<TemplateValidation> {
        let parameters = self
            .template_parameters
            .get(template_url)
            .cloned()
            .ok_or_else(|| {
                GatewayError::client(Some("ValidationError"), "Template format error")
            })?;
        Ok(TemplateValidation {
            description: Some(format!("Template at {template_url}")),
            parameters,
            capabilities: Vec::new(),
        })
    }

    async fn create_change_preview(&self, request: &PreviewRequest) -> Result<String> {
        self.record(Call::Preview(request.clone()));
        Ok(format!("arn:preview/{}", request.preview_name))
    }

    async fn describe_change_preview(
        &self,
        stack_name: &str,
        preview_name: &str,
    ) -> Result<ChangePreview> {
        let parameters = self
            .calls()
            .into_iter()
            .rev()
            .find_map(|c| match c {
                Call::Preview(p) if p.preview_name == preview_name => Some(p.stack.parameters),
                _ => None,
            })
            .unwrap_or_default();
        Ok(ChangePreview {
            stack_name: stack_name.to_string(),
            id: Some(format!("arn:preview/{preview_name}")),
            name: preview_name.to_string(),
            status: String::from("CREATE_COMPLETE"),
            status_reason: None,
            parameters,
            changes: self.changes.clone(),
        })
    }

    async fn wait_until(&self, stack_name: &str, target: &WaitTarget) -> Result<()> {
        self.record(Call::Wait(stack_name.to_string(), target.clone()));
        if let (WaitTarget::PreviewComplete { preview_name }, Some(reason)) =
            (target, &self.preview_failure)
        {
            return Err(GatewayError::WaitFailed {
                resource: preview_name.clone(),
                status: String::from("FAILED"),
                reason: reason.clone(),
            }
            .into());
        }
        Ok(())
    }
}
