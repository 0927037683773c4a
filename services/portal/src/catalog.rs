//! services/portal/src/catalog.rs
//!
//! The statically enumerated class groups and subject-code suggestions.
//! Owned by process-wide configuration; the UI shell reads these once and
//! never mutates them.

use studyhall_core::domain::ClassGroup;

/// Department prefixes paired with their UI color tag.
const DEPARTMENTS: [(&str, &str, &str); 4] = [
    ("cse", "CSE", "rose"),
    ("it", "IT", "emerald"),
    ("ece", "ECE", "cyan"),
    ("ee", "EE", "amber"),
];

const SEMESTERS: [&str; 8] = ["1st", "2nd", "3rd", "4th", "5th", "6th", "7th", "8th"];

/// Subject codes offered for autocomplete in the upload form.
pub const SUBJECT_CODES: [&str; 3] = ["PC-CS301", "ES-EC301", "ES-EE301"];

/// Builds the full class-group catalog: every department/semester pair plus
/// the two standalone courses.
pub fn class_groups() -> Vec<ClassGroup> {
    let mut groups: Vec<ClassGroup> = DEPARTMENTS
        .iter()
        .flat_map(|(id_prefix, name_prefix, color)| {
            SEMESTERS.iter().map(move |sem| ClassGroup {
                id: format!("{}-{}", id_prefix, sem),
                name: format!("{} {} Semester", name_prefix, sem),
                color: (*color).to_string(),
            })
        })
        .collect();

    groups.push(ClassGroup {
        id: "math-101".to_string(),
        name: "Mathematics 101".to_string(),
        color: "blue".to_string(),
    });
    groups.push(ClassGroup {
        id: "physics-202".to_string(),
        name: "Advanced Physics".to_string(),
        color: "purple".to_string(),
    });

    groups
}

/// Looks a class group up by identifier.
pub fn find_class(id: &str) -> Option<ClassGroup> {
    class_groups().into_iter().find(|c| c.id == id)
}
