//! Built-in intake forms shipped with the application.
//!
//! Two forms exist today: the donation intake wizard (with its
//! pickup / drop-off branch) and the volunteer sign-up wizard. Both are
//! authored in code so the engine, CLI, and tests share one source of
//! truth; external deployments can load their own schemas from YAML via
//! the engine's form-file parser instead.

use indexmap::IndexMap;
use serde_json::json;

use crate::form::{BranchRule, FieldDefinition, FieldKind, FieldValidation, FormSchema, StepDefinition};

/// Draft-store key and identifier of the donation form.
pub const DONATION_FORM_ID: &str = "donation-form";

/// Draft-store key and identifier of the volunteer form.
pub const VOLUNTEER_FORM_ID: &str = "volunteer-form";

fn text_field(label: &str, required: bool) -> FieldDefinition {
    FieldDefinition {
        label: label.to_string(),
        kind: FieldKind::Text,
        validate: FieldValidation {
            required,
            ..FieldValidation::default()
        },
        ..FieldDefinition::default()
    }
}

fn select_field(label: &str, values: &[&str]) -> FieldDefinition {
    FieldDefinition {
        label: label.to_string(),
        kind: FieldKind::Select,
        validate: FieldValidation {
            required: true,
            allowed_values: values.iter().map(|value| json!(value)).collect(),
            ..FieldValidation::default()
        },
        ..FieldDefinition::default()
    }
}

fn branch(field: &str, equals: &str) -> Option<BranchRule> {
    Some(BranchRule {
        field: field.to_string(),
        equals: json!(equals),
    })
}

/// The donation intake form.
///
/// Delivery method is the discriminator: choosing `pickup` requires an
/// address and a preferred date/time, choosing `drop_off` requires a
/// drop-off location instead. The items step demands a total quantity of at
/// least one.
pub fn donation_form() -> FormSchema {
    let mut fields = IndexMap::new();
    fields.insert(
        "name".to_string(),
        FieldDefinition {
            label: "Full name".into(),
            validate: FieldValidation {
                required: true,
                min_length: Some(2),
                max_length: Some(120),
                ..FieldValidation::default()
            },
            ..FieldDefinition::default()
        },
    );
    fields.insert(
        "phone".to_string(),
        FieldDefinition {
            label: "Contact number".into(),
            kind: FieldKind::Phone,
            validate: FieldValidation {
                required: true,
                pattern: Some(r"^[0-9]{10}$".into()),
                ..FieldValidation::default()
            },
            placeholder: Some("10-digit number".into()),
            ..FieldDefinition::default()
        },
    );
    fields.insert(
        "delivery_method".to_string(),
        select_field("How will the donation reach us?", &["pickup", "drop_off"]),
    );
    fields.insert(
        "address".to_string(),
        FieldDefinition {
            label: "Pickup address".into(),
            validate: FieldValidation {
                required: true,
                min_length: Some(5),
                ..FieldValidation::default()
            },
            branch: branch("delivery_method", "pickup"),
            ..FieldDefinition::default()
        },
    );
    fields.insert(
        "preferred_date".to_string(),
        FieldDefinition {
            label: "Preferred pickup date".into(),
            kind: FieldKind::Date,
            validate: FieldValidation {
                required: true,
                pattern: Some(r"^\d{4}-\d{2}-\d{2}$".into()),
                ..FieldValidation::default()
            },
            branch: branch("delivery_method", "pickup"),
            placeholder: Some("YYYY-MM-DD".into()),
            ..FieldDefinition::default()
        },
    );
    fields.insert(
        "preferred_time".to_string(),
        FieldDefinition {
            label: "Preferred pickup time".into(),
            kind: FieldKind::Time,
            validate: FieldValidation {
                required: true,
                pattern: Some(r"^\d{2}:\d{2}$".into()),
                ..FieldValidation::default()
            },
            branch: branch("delivery_method", "pickup"),
            placeholder: Some("HH:MM".into()),
            ..FieldDefinition::default()
        },
    );
    fields.insert(
        "dropoff_location".to_string(),
        FieldDefinition {
            label: "Drop-off location".into(),
            kind: FieldKind::Select,
            validate: FieldValidation {
                required: true,
                ..FieldValidation::default()
            },
            branch: branch("delivery_method", "drop_off"),
            ..FieldDefinition::default()
        },
    );
    fields.insert(
        "items".to_string(),
        FieldDefinition {
            label: "What are you donating?".into(),
            kind: FieldKind::Items,
            validate: FieldValidation {
                required: true,
                min_total_quantity: Some(1),
                ..FieldValidation::default()
            },
            ..FieldDefinition::default()
        },
    );
    fields.insert("notes".to_string(), text_field("Anything we should know?", false));

    FormSchema {
        form: DONATION_FORM_ID.into(),
        title: Some("Donate items".into()),
        discriminator: Some("delivery_method".into()),
        fields,
        steps: vec![
            StepDefinition {
                id: "contact".into(),
                title: "Your details".into(),
                fields: vec!["name".into(), "phone".into()],
            },
            StepDefinition {
                id: "delivery".into(),
                title: "Delivery".into(),
                fields: vec![
                    "delivery_method".into(),
                    "address".into(),
                    "preferred_date".into(),
                    "preferred_time".into(),
                    "dropoff_location".into(),
                ],
            },
            StepDefinition {
                id: "items".into(),
                title: "Donation items".into(),
                fields: vec!["items".into(), "notes".into()],
            },
        ],
    }
}

/// The volunteer sign-up form.
///
/// Role is the discriminator: the `driver` role additionally requires a
/// licence number. Availability survives role switches untouched (going
/// back never clears data).
pub fn volunteer_form() -> FormSchema {
    let mut fields = IndexMap::new();
    fields.insert(
        "name".to_string(),
        FieldDefinition {
            label: "Full name".into(),
            validate: FieldValidation {
                required: true,
                min_length: Some(2),
                max_length: Some(120),
                ..FieldValidation::default()
            },
            ..FieldDefinition::default()
        },
    );
    fields.insert(
        "phone".to_string(),
        FieldDefinition {
            label: "Contact number".into(),
            kind: FieldKind::Phone,
            validate: FieldValidation {
                required: true,
                pattern: Some(r"^[0-9]{10}$".into()),
                ..FieldValidation::default()
            },
            ..FieldDefinition::default()
        },
    );
    fields.insert(
        "email".to_string(),
        FieldDefinition {
            label: "Email".into(),
            kind: FieldKind::Email,
            validate: FieldValidation {
                required: false,
                pattern: Some(r"^[^@\s]+@[^@\s]+\.[^@\s]+$".into()),
                ..FieldValidation::default()
            },
            ..FieldDefinition::default()
        },
    );
    fields.insert("role".to_string(), select_field("Preferred role", &["events", "sorting", "driver"]));
    fields.insert(
        "drivers_license".to_string(),
        FieldDefinition {
            label: "Driving licence number".into(),
            validate: FieldValidation {
                required: true,
                min_length: Some(4),
                ..FieldValidation::default()
            },
            branch: branch("role", "driver"),
            ..FieldDefinition::default()
        },
    );
    fields.insert(
        "availability".to_string(),
        FieldDefinition {
            label: "When are you available?".into(),
            kind: FieldKind::Select,
            validate: FieldValidation {
                required: true,
                ..FieldValidation::default()
            },
            description: Some("One or more of weekdays, weekends, evenings".into()),
            ..FieldDefinition::default()
        },
    );
    fields.insert("notes".to_string(), text_field("Anything we should know?", false));

    FormSchema {
        form: VOLUNTEER_FORM_ID.into(),
        title: Some("Volunteer with us".into()),
        discriminator: Some("role".into()),
        fields,
        steps: vec![
            StepDefinition {
                id: "contact".into(),
                title: "Your details".into(),
                fields: vec!["name".into(), "phone".into(), "email".into()],
            },
            StepDefinition {
                id: "role".into(),
                title: "Role".into(),
                fields: vec!["role".into(), "drivers_license".into()],
            },
            StepDefinition {
                id: "availability".into(),
                title: "Availability".into(),
                fields: vec!["availability".into(), "notes".into()],
            },
        ],
    }
}

/// Look up a built-in form by its identifier.
pub fn builtin_form(id: &str) -> Option<FormSchema> {
    match id {
        DONATION_FORM_ID => Some(donation_form()),
        VOLUNTEER_FORM_ID => Some(volunteer_form()),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builtin_forms_verify() {
        donation_form().verify().expect("donation form is well formed");
        volunteer_form().verify().expect("volunteer form is well formed");
    }

    #[test]
    fn builtin_lookup_by_identifier() {
        assert!(builtin_form(DONATION_FORM_ID).is_some());
        assert!(builtin_form(VOLUNTEER_FORM_ID).is_some());
        assert!(builtin_form("unknown").is_none());
    }

    #[test]
    fn donation_form_branches_on_delivery_method() {
        let schema = donation_form();
        assert_eq!(schema.discriminator.as_deref(), Some("delivery_method"));
        assert!(schema.fields["address"].branch.is_some());
        assert!(schema.fields["dropoff_location"].branch.is_some());
        assert_eq!(schema.steps.len(), 3);
    }
}
