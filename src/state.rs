use crate::error::ChatError;

/// Audience of the next outgoing chat message.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Recipient {
    #[default]
    Public,
    Peer(String),
}

impl Recipient {
    /// Parses user input: `public` (any case) or a peer name.
    pub fn parse(input: &str) -> Recipient {
        let input = input.trim();
        if input.is_empty() || input.eq_ignore_ascii_case("public") {
            Recipient::Public
        } else {
            Recipient::Peer(input.to_string())
        }
    }
}

/// Identity, presence list and recipient selection of the local user.
#[derive(Debug, Default)]
pub struct SessionState {
    identity: Option<String>,
    peers: Vec<String>,
    selection: Recipient,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn identity(&self) -> Option<&str> {
        self.identity.as_deref()
    }

    pub fn peers(&self) -> &[String] {
        &self.peers
    }

    pub fn selection(&self) -> &Recipient {
        &self.selection
    }

    /// Replaces the identity. The name is stored exactly as given.
    pub fn set_identity(&mut self, name: &str) -> Result<(), ChatError> {
        if name.trim().is_empty() {
            return Err(ChatError::Validation("username must not be empty".into()));
        }
        self.identity = Some(name.to_string());
        // cannot address ourselves
        if matches!(&self.selection, Recipient::Peer(p) if p == name) {
            self.selection = Recipient::Public;
        }
        Ok(())
    }

    /// Replaces the whole presence list.
    ///
    /// Returns `true` when the selected peer disappeared and the selection
    /// fell back to [`Recipient::Public`].
    pub fn replace_peers(&mut self, peers: Vec<String>) -> bool {
        self.peers = peers;
        let stale = match &self.selection {
            Recipient::Public => false,
            Recipient::Peer(name) => !self.is_selectable(name),
        };
        if stale {
            self.selection = Recipient::Public;
        }
        stale
    }

    /// Peers that can be addressed, in server order, never including the
    /// local identity.
    pub fn recipients(&self) -> Vec<&str> {
        self.peers
            .iter()
            .map(String::as_str)
            .filter(|peer| Some(*peer) != self.identity())
            .collect()
    }

    pub fn select_recipient(&mut self, choice: Recipient) -> Result<(), ChatError> {
        if let Recipient::Peer(name) = &choice {
            if !self.is_selectable(name) {
                return Err(ChatError::UnknownRecipient(name.clone()));
            }
        }
        self.selection = choice;
        Ok(())
    }

    /// Advances the selection through `Public` and every selectable peer,
    /// wrapping around.
    pub fn cycle_recipient(&mut self) -> &Recipient {
        let recipients = self.recipients();
        let next = match &self.selection {
            Recipient::Public => recipients.first().map(|p| p.to_string()),
            Recipient::Peer(current) => recipients
                .iter()
                .position(|p| p == current)
                .and_then(|i| recipients.get(i + 1))
                .map(|p| p.to_string()),
        };
        self.selection = next.map_or(Recipient::Public, Recipient::Peer);
        &self.selection
    }

    fn is_selectable(&self, name: &str) -> bool {
        Some(name) != self.identity() && self.peers.iter().any(|p| p == name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn peers(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    #[test]
    fn rejects_blank_identity() {
        let mut state = SessionState::new();
        for name in ["", "   ", "\t\n"] {
            assert!(matches!(
                state.set_identity(name),
                Err(ChatError::Validation(_))
            ));
        }
        assert_eq!(state.identity(), None);
    }

    #[test]
    fn identity_is_replaced_not_accumulated() {
        let mut state = SessionState::new();
        state.set_identity("alice").unwrap();
        state.set_identity(" alice2 ").unwrap();
        assert_eq!(state.identity(), Some(" alice2 "));
    }

    #[test]
    fn recipients_exclude_local_identity() {
        let mut state = SessionState::new();
        state.set_identity("alice").unwrap();
        state.replace_peers(peers(&["alice", "bob"]));
        assert_eq!(state.recipients(), vec!["bob"]);
        assert_eq!(state.peers(), peers(&["alice", "bob"]).as_slice());
    }

    #[test]
    fn recipients_follow_identity_changes() {
        let mut state = SessionState::new();
        state.replace_peers(peers(&["alice", "bob", "carol"]));
        assert_eq!(state.recipients(), vec!["alice", "bob", "carol"]);
        state.set_identity("carol").unwrap();
        assert_eq!(state.recipients(), vec!["alice", "bob"]);
    }

    #[test]
    fn selection_resets_when_peer_leaves() {
        let mut state = SessionState::new();
        state.set_identity("alice").unwrap();
        state.replace_peers(peers(&["alice", "bob"]));
        state.select_recipient(Recipient::Peer("bob".into())).unwrap();

        assert!(!state.replace_peers(peers(&["bob", "alice", "carol"])));
        assert_eq!(state.selection(), &Recipient::Peer("bob".into()));

        assert!(state.replace_peers(peers(&["alice", "carol"])));
        assert_eq!(state.selection(), &Recipient::Public);
    }

    #[test]
    fn selection_stays_within_peer_set() {
        let mut state = SessionState::new();
        state.set_identity("alice").unwrap();
        let lists = [
            peers(&["alice", "bob", "carol"]),
            peers(&["carol"]),
            peers(&[]),
            peers(&["bob", "dave"]),
        ];
        for list in lists {
            for name in ["bob", "carol", "dave"] {
                let _ = state.select_recipient(Recipient::Peer(name.into()));
            }
            state.replace_peers(list.clone());
            match state.selection() {
                Recipient::Public => {}
                Recipient::Peer(p) => {
                    assert!(list.contains(p));
                    assert_ne!(p, "alice");
                }
            }
        }
    }

    #[test]
    fn cannot_select_absent_peer_or_self() {
        let mut state = SessionState::new();
        state.set_identity("alice").unwrap();
        state.replace_peers(peers(&["alice", "bob"]));
        assert_eq!(
            state.select_recipient(Recipient::Peer("zed".into())),
            Err(ChatError::UnknownRecipient("zed".into()))
        );
        assert!(state
            .select_recipient(Recipient::Peer("alice".into()))
            .is_err());
        assert_eq!(state.selection(), &Recipient::Public);
        assert!(state.select_recipient(Recipient::Public).is_ok());
    }

    #[test]
    fn taking_the_selected_name_resets_selection() {
        let mut state = SessionState::new();
        state.replace_peers(peers(&["bob", "carol"]));
        state.select_recipient(Recipient::Peer("bob".into())).unwrap();
        state.set_identity("bob").unwrap();
        assert_eq!(state.selection(), &Recipient::Public);
    }

    #[test]
    fn cycles_through_public_and_peers() {
        let mut state = SessionState::new();
        state.set_identity("alice").unwrap();
        state.replace_peers(peers(&["alice", "bob", "carol"]));
        assert_eq!(state.cycle_recipient(), &Recipient::Peer("bob".into()));
        assert_eq!(state.cycle_recipient(), &Recipient::Peer("carol".into()));
        assert_eq!(state.cycle_recipient(), &Recipient::Public);
    }

    #[test]
    fn parses_recipient_input() {
        assert_eq!(Recipient::parse("Public"), Recipient::Public);
        assert_eq!(Recipient::parse(""), Recipient::Public);
        assert_eq!(Recipient::parse(" bob "), Recipient::Peer("bob".into()));
    }
}
