use rust_decimal::Decimal;

/// A rail webhook payload, parsed once at the boundary into the one shape the
/// reconciler's handlers understand. Every rail adapter maps its own loosely
/// typed JSON onto these variants in `parse_event`.
#[derive(Debug, Clone, PartialEq)]
pub enum RailEvent {
    /// The rail captured the funds; drives the ledger mutation.
    CaptureCompleted {
        external_ref: String,
        amount: Option<Decimal>,
        currency: Option<String>,
    },
    /// The rail declined the payment.
    CaptureDenied {
        external_ref: String,
        reason: Option<String>,
    },
    /// The payer abandoned or cancelled the flow.
    CaptureCancelled { external_ref: String },
    /// Post-completion refund/reversal; drives the credit-back path.
    CaptureReversed {
        external_ref: String,
        reason: Option<String>,
    },
}

impl RailEvent {
    pub fn external_ref(&self) -> &str {
        match self {
            RailEvent::CaptureCompleted { external_ref, .. }
            | RailEvent::CaptureDenied { external_ref, .. }
            | RailEvent::CaptureCancelled { external_ref }
            | RailEvent::CaptureReversed { external_ref, .. } => external_ref,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            RailEvent::CaptureCompleted { .. } => "capture.completed",
            RailEvent::CaptureDenied { .. } => "capture.denied",
            RailEvent::CaptureCancelled { .. } => "capture.cancelled",
            RailEvent::CaptureReversed { .. } => "capture.reversed",
        }
    }
}
