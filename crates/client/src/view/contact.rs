//! Contact page.

use std::time::Duration;

use getyourshare_shared::{ContactCategory, ContactForm};

use super::store::{ViewState, ViewStore};
use super::ViewContext;

/// How long the "message sent" banner stays up.
pub const SUBMITTED_BANNER: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ContactState {
    pub form: ContactForm,
    pub submitting: bool,
    pub submitted: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ContactAction {
    SetName(String),
    SetEmail(String),
    SetPhone(String),
    SetSubject(String),
    SetMessage(String),
    SetCategory(ContactCategory),
    SetSubmitting(bool),
    SetSubmitted(bool),
    Reset(ContactForm),
}

impl ViewState for ContactState {
    type Action = ContactAction;

    fn reduce(&mut self, action: ContactAction) {
        match action {
            ContactAction::SetName(v) => self.form.name = v,
            ContactAction::SetEmail(v) => self.form.email = v,
            ContactAction::SetPhone(v) => self.form.phone = v,
            ContactAction::SetSubject(v) => self.form.subject = v,
            ContactAction::SetMessage(v) => self.form.message = v,
            ContactAction::SetCategory(c) => self.form.category = c,
            ContactAction::SetSubmitting(v) => self.submitting = v,
            ContactAction::SetSubmitted(v) => self.submitted = v,
            ContactAction::Reset(form) => self.form = form,
        }
    }
}

#[derive(Clone)]
pub struct ContactController {
    store: ViewStore<ContactState>,
    ctx: ViewContext,
}

impl ContactController {
    /// New page with the form prefilled from the signed-in user.
    pub fn new(ctx: ViewContext) -> Self {
        let form = ContactForm::prefilled(ctx.auth.identity().as_ref());
        Self {
            store: ViewStore::new(ContactState {
                form,
                ..ContactState::default()
            }),
            ctx,
        }
    }

    pub fn store(&self) -> &ViewStore<ContactState> {
        &self.store
    }

    pub fn state(&self) -> ContactState {
        self.store.snapshot()
    }

    pub fn dispatch(&self, action: ContactAction) -> bool {
        self.store.dispatch(action)
    }

    pub fn unmount(&self) {
        self.store.unmount();
    }

    /// Validate and send the form. Returns whether the backend accepted it.
    pub async fn submit(&self) -> bool {
        let form = self.store.with(|s| s.form.clone());
        let missing = form.missing_required();
        if !missing.is_empty() {
            crate::log_debug!("Contact form missing {:?}", missing);
            self.ctx
                .notifier
                .warning("Veuillez remplir tous les champs obligatoires");
            return false;
        }

        self.dispatch(ContactAction::SetSubmitting(true));
        let accepted = match self.ctx.api.submit_contact(&form).await {
            Ok(response) if response.success => {
                let message = response
                    .message
                    .unwrap_or_else(|| "Message envoyé avec succès!".to_string());
                self.ctx.notifier.success(&message);
                self.dispatch(ContactAction::SetSubmitted(true));
                self.dispatch(ContactAction::Reset(ContactForm::prefilled(
                    self.ctx.auth.identity().as_ref(),
                )));
                self.schedule_banner_reset();
                true
            }
            Ok(response) => {
                crate::log_warn!("Contact form rejected: {:?}", response.message);
                let message = response
                    .message
                    .unwrap_or_else(|| "Erreur lors de l'envoi du message".to_string());
                self.ctx.notifier.error(&message);
                false
            }
            Err(e) => {
                crate::log_error!("Error submitting contact form: {}", e);
                self.ctx
                    .notifier
                    .error(&e.user_message("Erreur lors de l'envoi du message"));
                false
            }
        };
        self.dispatch(ContactAction::SetSubmitting(false));
        accepted
    }

    fn schedule_banner_reset(&self) {
        let store = self.store.clone();
        tokio::spawn(async move {
            tokio::time::sleep(SUBMITTED_BANNER).await;
            store.dispatch(ContactAction::SetSubmitted(false));
        });
    }
}
