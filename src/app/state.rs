// SPDX-License-Identifier: GPL-3.0-only

//! Acquisition state machine and the render contract derived from it

use crate::backends::camera::types::ErrorKind;
use crate::fl;

/// Externally observable state of a capture session
///
/// ```text
/// Loading ──▶ Ready ──▶ Captured
///    │  ▲
///    ▼  │ manual retry
///  Error
///
/// any ──▶ Cancelled (back) ──▶ Unmounted
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum AcquisitionState {
    /// Negotiating the camera
    #[default]
    Loading,
    /// Metadata loaded and playback started; capture is possible
    Ready,
    /// Negotiation gave up
    Error {
        kind: ErrorKind,
        /// Localized user-facing message
        message: String,
    },
    /// An image was handed to the host; the core is done
    Captured,
    /// The user backed out; no further negotiation or capture
    Cancelled,
    /// Session torn down
    Unmounted,
}

impl AcquisitionState {
    pub fn is_ready(&self) -> bool {
        matches!(self, AcquisitionState::Ready)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, AcquisitionState::Error { .. })
    }

    /// No further negotiation result may change this state
    pub fn is_final(&self) -> bool {
        matches!(
            self,
            AcquisitionState::Captured | AcquisitionState::Cancelled | AcquisitionState::Unmounted
        )
    }
}

impl std::fmt::Display for AcquisitionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            AcquisitionState::Loading => write!(f, "loading"),
            AcquisitionState::Ready => write!(f, "ready"),
            AcquisitionState::Error { kind, .. } => write!(f, "error ({})", kind),
            AcquisitionState::Captured => write!(f, "captured"),
            AcquisitionState::Cancelled => write!(f, "cancelled"),
            AcquisitionState::Unmounted => write!(f, "unmounted"),
        }
    }
}

/// Value published to the host on every observable change
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionSnapshot {
    pub state: AcquisitionState,
    /// Capture flash is showing
    pub flashing: bool,
}

impl SessionSnapshot {
    /// Derive what the screen should show
    pub fn render(&self) -> RenderContract {
        let mounted = self.state != AcquisitionState::Unmounted;
        let upload_enabled = matches!(
            self.state,
            AcquisitionState::Loading | AcquisitionState::Ready | AcquisitionState::Error { .. }
        );

        let error = match &self.state {
            AcquisitionState::Error { message, .. } => Some(ErrorPanel {
                title: fl!("error-title"),
                message: message.clone(),
                retry_label: fl!("retry"),
                upload_label: fl!("upload-photo"),
                retry_enabled: true,
                upload_enabled: true,
            }),
            _ => None,
        };

        RenderContract {
            show_preview: self.state.is_ready(),
            show_spinner: self.state == AcquisitionState::Loading,
            loading_text: (self.state == AcquisitionState::Loading).then(|| fl!("loading")),
            show_capture_controls: matches!(
                self.state,
                AcquisitionState::Loading | AcquisitionState::Ready
            ),
            capture_enabled: self.state.is_ready() && !self.flashing,
            upload_enabled,
            back_enabled: mounted,
            flashing: self.flashing,
            error,
        }
    }
}

/// Error panel shown in place of the preview
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorPanel {
    pub title: String,
    pub message: String,
    /// Label of the manual retry action
    pub retry_label: String,
    /// Label of the file upload action
    pub upload_label: String,
    pub retry_enabled: bool,
    pub upload_enabled: bool,
}

/// Everything the screen needs to draw the capture view
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderContract {
    pub show_preview: bool,
    pub show_spinner: bool,
    pub loading_text: Option<String>,
    pub show_capture_controls: bool,
    pub capture_enabled: bool,
    pub upload_enabled: bool,
    pub back_enabled: bool,
    pub flashing: bool,
    pub error: Option<ErrorPanel>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snapshot(state: AcquisitionState) -> SessionSnapshot {
        SessionSnapshot {
            state,
            flashing: false,
        }
    }

    #[test]
    fn test_loading_contract() {
        let contract = snapshot(AcquisitionState::Loading).render();
        assert!(contract.show_spinner);
        assert_eq!(contract.loading_text, Some(fl!("loading")));
        assert!(!contract.capture_enabled);
        assert!(contract.back_enabled);
        assert!(contract.error.is_none());
    }

    #[test]
    fn test_ready_contract() {
        let contract = snapshot(AcquisitionState::Ready).render();
        assert!(contract.show_preview);
        assert!(contract.capture_enabled);
        assert!(!contract.show_spinner);
        assert!(contract.loading_text.is_none());

        let flashing = SessionSnapshot {
            state: AcquisitionState::Ready,
            flashing: true,
        }
        .render();
        assert!(flashing.flashing);
        assert!(!flashing.capture_enabled);
    }

    #[test]
    fn test_error_always_offers_recovery() {
        let state = AcquisitionState::Error {
            kind: ErrorKind::NotFound,
            message: "none".to_string(),
        };
        let contract = snapshot(state).render();
        let panel = contract.error.unwrap();
        assert_eq!(panel.title, fl!("error-title"));
        assert_eq!(panel.message, "none");
        assert_eq!(panel.retry_label, fl!("retry"));
        assert_eq!(panel.upload_label, fl!("upload-photo"));
        assert!(panel.retry_enabled);
        assert!(panel.upload_enabled);
        assert!(!contract.capture_enabled);
        assert!(contract.back_enabled);
    }

    #[test]
    fn test_cancelled_is_final_and_inert() {
        assert!(AcquisitionState::Cancelled.is_final());
        let contract = snapshot(AcquisitionState::Cancelled).render();
        assert!(!contract.show_preview);
        assert!(!contract.show_spinner);
        assert!(!contract.capture_enabled);
        assert!(!contract.upload_enabled);
    }

    #[test]
    fn test_unmounted_contract_is_inert() {
        let contract = snapshot(AcquisitionState::Unmounted).render();
        assert!(!contract.back_enabled);
        assert!(!contract.upload_enabled);
        assert!(!contract.show_capture_controls);
    }
}
