use crate::defs::DEFAULT_TICKET_NAME;

use std::fmt;

/// A single ticket in the marketplace.
///
/// Tickets are immutable once minted: the pool creates one on every
/// successful production and the ticket is discarded when a customer
/// consumes it. Ids increase strictly within a run and restart at 1
/// after a pool reset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Ticket {
    /// Unique, strictly increasing id assigned by the pool.
    pub id: u64,

    /// Display name of the event the ticket is for.
    pub name: String,
}

impl Ticket {
    /// Mints a ticket with the given id and the default event name.
    ///
    /// # Example
    ///
    /// ```
    /// use ticket_sim::ticket::Ticket;
    /// let ticket = Ticket::new(1);
    /// assert_eq!(ticket.id, 1);
    /// assert_eq!(ticket.name, "Sample Event");
    /// ```
    pub fn new(id: u64) -> Self {
        Ticket {
            id,
            name: DEFAULT_TICKET_NAME.to_string(),
        }
    }
}

impl fmt::Display for Ticket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Ticket ID: {} Event Name: {}", self.id, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_uses_default_name() {
        let ticket = Ticket::new(7);
        assert_eq!(ticket.id, 7);
        assert_eq!(ticket.name, DEFAULT_TICKET_NAME);
    }

    #[test]
    fn test_display_format() {
        let ticket = Ticket::new(42);
        assert_eq!(ticket.to_string(), "Ticket ID: 42 Event Name: Sample Event");
    }
}
