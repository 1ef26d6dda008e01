//! Participant address extraction from thread headers

use crate::models::{Address, Message};
use mailparse::MailAddr;
use std::collections::BTreeSet;
use tracing::trace;

/// Header carrying the incoming sender
const INCOMING_HEADER: &str = "From";

/// Headers whose addresses count as thread participants
const PARTICIPANT_HEADERS: &[&str] = &["From", "To", "Cc", "Delivered-To"];

/// Addresses found in one thread
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ThreadAddresses {
    /// Senders (From headers only)
    pub incoming: BTreeSet<Address>,
    /// Every participant (From, To, Cc, Delivered-To)
    pub all: BTreeSet<Address>,
}

impl ThreadAddresses {
    pub fn is_empty(&self) -> bool {
        self.all.is_empty()
    }
}

/// Collect incoming and participant addresses from every message of a thread
pub fn extract_addresses(messages: &[Message]) -> ThreadAddresses {
    let mut addresses = ThreadAddresses::default();

    for message in messages {
        for header in &message.headers {
            let is_incoming = header.is(INCOMING_HEADER);
            let is_participant = PARTICIPANT_HEADERS.iter().any(|name| header.is(name));
            if !is_participant {
                continue;
            }

            for address in parse_address_list(&header.value) {
                if is_incoming {
                    addresses.incoming.insert(address.clone());
                }
                addresses.all.insert(address);
            }
        }
    }

    trace!(
        "Extracted {} incoming and {} participant addresses from {} messages",
        addresses.incoming.len(),
        addresses.all.len(),
        messages.len()
    );
    addresses
}

/// Parse a header value into normalized addresses, dropping display names
///
/// Blank comma-separated components are removed before the value is parsed as
/// a whole. When that fails, each component is parsed on its own and
/// components that still fail are skipped.
pub fn parse_address_list(value: &str) -> Vec<Address> {
    let components: Vec<&str> = split_components(value)
        .into_iter()
        .filter(|component| !component.trim().is_empty())
        .collect();
    if components.is_empty() {
        return Vec::new();
    }

    match mailparse::addrparse(&components.join(",")) {
        Ok(list) => list.iter().flat_map(bare_addresses).collect(),
        Err(_) => components
            .iter()
            .filter_map(|component| mailparse::addrparse(component).ok())
            .flat_map(|list| list.iter().flat_map(bare_addresses).collect::<Vec<_>>())
            .collect(),
    }
}

/// Split on commas outside quoted strings and angle brackets
fn split_components(value: &str) -> Vec<&str> {
    let mut components = Vec::new();
    let mut start = 0;
    let mut in_quotes = false;
    let mut escaped = false;
    let mut angle_depth = 0usize;

    for (idx, c) in value.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' if in_quotes => escaped = true,
            '"' => in_quotes = !in_quotes,
            '<' if !in_quotes => angle_depth += 1,
            '>' if !in_quotes => angle_depth = angle_depth.saturating_sub(1),
            ',' if !in_quotes && angle_depth == 0 => {
                components.push(&value[start..idx]);
                start = idx + 1;
            }
            _ => {}
        }
    }
    components.push(&value[start..]);
    components
}

fn bare_addresses(addr: &MailAddr) -> Vec<Address> {
    match addr {
        MailAddr::Single(info) => Address::normalize(&info.addr).into_iter().collect(),
        MailAddr::Group(group) => group
            .addrs
            .iter()
            .filter_map(|info| Address::normalize(&info.addr))
            .collect(),
    }
}

/// Bodies of the messages that have one
pub fn message_bodies(messages: &[Message]) -> Vec<String> {
    messages
        .iter()
        .filter_map(|message| message.body.clone())
        .collect()
}
