//! Wire events pushed to websocket clients.

use serde::{Deserialize, Serialize};

use formline_types::FormView;

/// An event pushed to a connected client.
///
/// The `event` tag doubles as the client-side handler name.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "event")]
pub enum HubEvent {
    /// A form logged in the receiving client's own session.
    ReceiveUserForm { form: FormView },

    /// A form logged anywhere, delivered to admin subscribers.
    AdminReceiveForm { form: FormView },

    /// A form's lifecycle state changed, delivered to admin subscribers.
    FormStateChanged { form: FormView },
}

#[cfg(test)]
mod tests {
    use super::*;
    use formline_types::{Form, FormCategory, FormUrgency};

    #[test]
    fn test_event_tag_names_the_handler() {
        let form = Form::new("vpn down", FormCategory::Technical, FormUrgency::High, None);
        let event = HubEvent::ReceiveUserForm {
            form: FormView::project(&form, None),
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "ReceiveUserForm");
        assert_eq!(json["form"]["description"], "vpn down");
    }

    #[test]
    fn test_event_round_trips_unchanged() {
        let form = Form::new("vpn down", FormCategory::Technical, FormUrgency::High, None);
        let event = HubEvent::AdminReceiveForm {
            form: FormView::project(&form, Some("ada".to_string())),
        };

        let json = serde_json::to_string(&event).unwrap();
        let decoded: HubEvent = serde_json::from_str(&json).unwrap();
        assert_eq!(decoded, event);
    }
}
