use uuid::Uuid;

// ============================================================================
// Aggregate Root Pattern
// ============================================================================
//
// Key Principles:
// 1. Commands are validated against current state before anything changes
// 2. A validated command yields events; events are facts
// 3. State only changes by applying those events
// 4. A rejected command leaves the aggregate untouched
//
// ============================================================================

/// Generic Aggregate trait
///
/// Type Parameters:
/// - `Event`: The domain event type for this aggregate
/// - `Command`: The command type for this aggregate
/// - `Error`: The error type for business rule violations
pub trait Aggregate: Sized + Send + Sync {
    type Event;
    type Command;
    type Error;

    /// Apply an event to update state
    fn apply_event(&mut self, event: &Self::Event) -> Result<(), Self::Error>;

    /// Handle command and emit events (business logic)
    fn handle_command(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>;

    fn aggregate_id(&self) -> Uuid;

    /// Number of events applied over the aggregate's lifetime
    fn version(&self) -> i64;

    /// Validate a command and apply the resulting events.
    ///
    /// Events are applied to a copy first so a failing `apply_event`
    /// cannot leave the aggregate half-updated.
    fn execute(&mut self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error>
    where
        Self: Clone,
    {
        let events = self.handle_command(command)?;
        if events.is_empty() {
            return Ok(events);
        }

        let mut next = self.clone();
        for event in &events {
            next.apply_event(event)?;
        }
        *self = next;

        Ok(events)
    }
}
