//! Generic admin CRUD controller.
//!
//! Every back-office list page drives one of these over a
//! [`ResourceService`]. Mutations follow a fixed order on success:
//! close the open modal, refresh the list, then notify. A 200 response
//! is not enough; the envelope's `status` field decides success, and a
//! domain failure surfaces as an error notification without touching
//! the modal.

use tracing::{debug, warn};

use crate::services::ResourceService;

/// Modal visibility. Exactly one modal can be open at a time; the
/// variants make that a type-level invariant rather than a caller
/// convention.
#[derive(Debug, Clone, PartialEq)]
pub enum Modal<T> {
    Closed,
    Creating,
    Editing(T),
    ConfirmingDelete(i64),
}

#[derive(Debug, Clone)]
pub struct CrudState<T> {
    pub data: Vec<T>,
    pub loading: bool,
    pub error: Option<String>,
    pub modal: Modal<T>,
}

impl<T> Default for CrudState<T> {
    fn default() -> Self {
        Self {
            data: Vec::new(),
            loading: false,
            error: None,
            modal: Modal::Closed,
        }
    }
}

/// Synchronous state transitions. Async side effects happen in the
/// controller before dispatch.
#[derive(Debug)]
pub enum Action<T> {
    SetLoading(bool),
    SetError(Option<String>),
    SetData(Vec<T>),
    OpenCreate,
    OpenEdit(T),
    OpenDelete(i64),
    CloseModals,
}

pub fn reduce<T>(state: &mut CrudState<T>, action: Action<T>) {
    match action {
        Action::SetLoading(v) => state.loading = v,
        Action::SetError(e) => state.error = e,
        Action::SetData(items) => {
            state.data = items;
            state.error = None;
            state.loading = false;
        }
        Action::OpenCreate => state.modal = Modal::Creating,
        Action::OpenEdit(item) => state.modal = Modal::Editing(item),
        Action::OpenDelete(id) => state.modal = Modal::ConfirmingDelete(id),
        // Idempotent: closing with nothing open is a no-op.
        Action::CloseModals => state.modal = Modal::Closed,
    }
}

/// User-facing feedback sink. The server binary logs; a UI layer
/// would render toasts.
pub trait Notifier: Send + Sync {
    fn success(&self, message: &str);
    fn error(&self, message: &str);
    fn info(&self, message: &str);
}

/// Notifier that writes through tracing, used by the CLI.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn success(&self, message: &str) {
        tracing::info!(%message, "ok");
    }

    fn error(&self, message: &str) {
        tracing::error!(%message, "falha");
    }

    fn info(&self, message: &str) {
        tracing::info!(%message, "aviso");
    }
}

pub struct CrudController<S: ResourceService, N: Notifier> {
    service: S,
    notifier: N,
    /// Singular resource label for notifications ("imóvel", "estado"...).
    label: String,
    pub state: CrudState<S::Item>,
}

impl<S: ResourceService, N: Notifier> CrudController<S, N> {
    pub fn new(service: S, notifier: N, label: impl Into<String>) -> Self {
        Self {
            service,
            notifier,
            label: label.into(),
            state: CrudState::default(),
        }
    }

    /// Reloads the list. Called once at startup and after every
    /// successful mutation.
    pub async fn refresh(&mut self) {
        reduce(&mut self.state, Action::SetLoading(true));
        match self.service.get_all().await {
            Ok(items) => {
                debug!(count = items.len(), label = %self.label, "Lista atualizada");
                reduce(&mut self.state, Action::SetData(items));
            }
            Err(err) => {
                let message = err.to_string();
                warn!(label = %self.label, error = %message, "Falha ao carregar lista");
                reduce(&mut self.state, Action::SetError(Some(message.clone())));
                reduce(&mut self.state, Action::SetLoading(false));
                self.notifier.error(&message);
            }
        }
    }

    pub fn open_create(&mut self) {
        reduce(&mut self.state, Action::OpenCreate);
    }

    pub fn open_edit(&mut self, item: S::Item) {
        reduce(&mut self.state, Action::OpenEdit(item));
    }

    pub fn open_delete(&mut self, id: i64) {
        reduce(&mut self.state, Action::OpenDelete(id));
    }

    pub fn close_modals(&mut self) {
        reduce(&mut self.state, Action::CloseModals);
    }

    pub async fn handle_create(&mut self, input: &S::Input) {
        match self.service.create(input).await {
            Ok(_) => {
                reduce(&mut self.state, Action::CloseModals);
                self.refresh().await;
                self.notifier
                    .success(&format!("{} criado com sucesso", self.label));
            }
            Err(err) => self.notifier.error(&err.to_string()),
        }
    }

    pub async fn handle_update(&mut self, id: i64, input: &S::Input) {
        match self.service.update(id, input).await {
            Ok(_) => {
                reduce(&mut self.state, Action::CloseModals);
                self.refresh().await;
                self.notifier
                    .success(&format!("{} atualizado com sucesso", self.label));
            }
            Err(err) => self.notifier.error(&err.to_string()),
        }
    }

    /// Deletes the id held by the confirmation modal. Does nothing if
    /// no delete confirmation is open.
    pub async fn handle_delete(&mut self) {
        let Modal::ConfirmingDelete(id) = &self.state.modal else {
            return;
        };
        let id = *id;
        match self.service.delete(id).await {
            Ok(_) => {
                reduce(&mut self.state, Action::CloseModals);
                self.refresh().await;
                self.notifier
                    .success(&format!("{} excluído com sucesso", self.label));
            }
            Err(err) => self.notifier.error(&err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::ClientError;
    use crate::models::{Envelope, HasId};
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[derive(Debug, Clone, PartialEq)]
    struct Row {
        id: i64,
    }

    impl HasId for Row {
        fn id(&self) -> i64 {
            self.id
        }
    }

    struct FakeService {
        rows: Mutex<Vec<Row>>,
        fail_create: bool,
    }

    fn ok_envelope() -> Envelope {
        serde_json::from_value(serde_json::json!({"status": "success"})).unwrap()
    }

    #[async_trait]
    impl ResourceService for Arc<FakeService> {
        type Item = Row;
        type Input = i64;

        async fn get_all(&self) -> Result<Vec<Row>, ClientError> {
            Ok(self.rows.lock().clone())
        }

        async fn create(&self, input: &i64) -> Result<Envelope, ClientError> {
            if self.fail_create {
                return Err(ClientError::Domain("duplicado".to_string()));
            }
            self.rows.lock().push(Row { id: *input });
            Ok(ok_envelope())
        }

        async fn update(&self, _id: i64, _input: &i64) -> Result<Envelope, ClientError> {
            Ok(ok_envelope())
        }

        async fn delete(&self, id: i64) -> Result<Envelope, ClientError> {
            self.rows.lock().retain(|r| r.id != id);
            Ok(ok_envelope())
        }
    }

    #[derive(Default)]
    struct RecordingNotifier {
        messages: Mutex<Vec<(String, String)>>,
    }

    impl Notifier for Arc<RecordingNotifier> {
        fn success(&self, message: &str) {
            self.messages
                .lock()
                .push(("success".to_string(), message.to_string()));
        }

        fn error(&self, message: &str) {
            self.messages
                .lock()
                .push(("error".to_string(), message.to_string()));
        }

        fn info(&self, message: &str) {
            self.messages
                .lock()
                .push(("info".to_string(), message.to_string()));
        }
    }

    fn controller(
        fail_create: bool,
    ) -> (
        CrudController<Arc<FakeService>, Arc<RecordingNotifier>>,
        Arc<RecordingNotifier>,
    ) {
        let service = Arc::new(FakeService {
            rows: Mutex::new(vec![Row { id: 1 }]),
            fail_create,
        });
        let notifier = Arc::new(RecordingNotifier::default());
        (
            CrudController::new(service, notifier.clone(), "registro"),
            notifier,
        )
    }

    #[tokio::test]
    async fn create_closes_modal_refreshes_then_notifies() {
        let (mut ctl, notifier) = controller(false);
        ctl.open_create();
        ctl.handle_create(&2).await;

        assert_eq!(ctl.state.modal, Modal::Closed);
        assert_eq!(ctl.state.data.len(), 2);
        let messages = notifier.messages.lock();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "success");
        assert_eq!(messages[0].1, "registro criado com sucesso");
    }

    #[tokio::test]
    async fn domain_failure_keeps_modal_open() {
        let (mut ctl, notifier) = controller(true);
        ctl.open_create();
        ctl.handle_create(&2).await;

        assert_eq!(ctl.state.modal, Modal::Creating);
        assert!(ctl.state.data.is_empty());
        let messages = notifier.messages.lock();
        assert_eq!(messages[0], ("error".to_string(), "duplicado".to_string()));
    }

    #[tokio::test]
    async fn delete_uses_id_from_confirmation_modal() {
        let (mut ctl, _) = controller(false);
        ctl.open_delete(1);
        ctl.handle_delete().await;

        assert_eq!(ctl.state.modal, Modal::Closed);
        assert!(ctl.state.data.is_empty());
    }

    #[tokio::test]
    async fn delete_without_confirmation_is_a_noop() {
        let (mut ctl, notifier) = controller(false);
        ctl.handle_delete().await;

        assert!(notifier.messages.lock().is_empty());
    }

    #[test]
    fn modals_are_mutually_exclusive() {
        let mut state: CrudState<Row> = CrudState::default();
        reduce(&mut state, Action::OpenCreate);
        reduce(&mut state, Action::OpenEdit(Row { id: 5 }));
        assert_eq!(state.modal, Modal::Editing(Row { id: 5 }));
        reduce(&mut state, Action::OpenDelete(5));
        assert_eq!(state.modal, Modal::ConfirmingDelete(5));
    }

    #[test]
    fn close_modals_is_idempotent() {
        let mut state: CrudState<Row> = CrudState::default();
        reduce(&mut state, Action::CloseModals);
        assert_eq!(state.modal, Modal::Closed);
        reduce(&mut state, Action::CloseModals);
        assert_eq!(state.modal, Modal::Closed);
    }
}
