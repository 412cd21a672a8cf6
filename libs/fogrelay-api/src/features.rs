/// Feature names of the glucose model, in the order the model consumes them.
pub const GLUCOSE_FEATURES: [&str; 8] = [
    "PPG_Signal",
    "Heart_Rate",
    "Systolic_Peak",
    "Diastolic_Peak",
    "Pulse_Area",
    "Age",
    "Weight",
    "Gender",
];

/// Field carrying the producer-side send time (epoch seconds, float).
pub const TIMESTAMP_SENT: &str = "timestamp_sent";
