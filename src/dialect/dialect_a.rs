//! Dialect A: the single-file week-mask export.
//!
//! Every placement child inside a Course element carries its own 52-bit
//! `Weeks` mask. Teachers come with a vendor personnel id, matched against
//! the `vendorId` property on existing graph users.

use super::{DialectSpec, ElementSpec, EntityKind};

pub static SPEC: DialectSpec = DialectSpec {
    source: "DIALECT_A",
    teacher_id_attribute: Some("personnelId"),
    scoped_personnel_ids: true,
    graph_match_attribute: "vendorId",
    course_level_mask: false,
    elements: &[
        ElementSpec {
            tag: "Year",
            canon: "SchoolYear",
            kind: EntityKind::SchoolYear,
            fields: &[("FirstWeekDate", "firstWeekDate")],
        },
        ElementSpec {
            tag: "Grid",
            canon: "ScheduleGrid",
            kind: EntityKind::ScheduleGrid,
            fields: &[("SlotDuration", "slotDuration")],
        },
        ElementSpec {
            tag: "Slot",
            canon: "Slot",
            kind: EntityKind::ScheduleGrid,
            fields: &[("Number", "number"), ("StartTime", "startTime")],
        },
        ElementSpec {
            tag: "Room",
            canon: "Room",
            kind: EntityKind::Room,
            fields: &[("Id", "id"), ("Name", "name"), ("Weeks", "weeks")],
        },
        ElementSpec {
            tag: "Device",
            canon: "Equipment",
            kind: EntityKind::Equipment,
            fields: &[("Id", "id"), ("Name", "name"), ("Weeks", "weeks")],
        },
        ElementSpec {
            tag: "Subject",
            canon: "Subject",
            kind: EntityKind::Subject,
            fields: &[("Id", "id"), ("Code", "code"), ("Label", "label"), ("Weeks", "weeks")],
        },
        ElementSpec {
            tag: "Class",
            canon: "Class",
            kind: EntityKind::Class,
            fields: &[("Id", "id"), ("Name", "name"), ("Weeks", "weeks")],
        },
        ElementSpec {
            tag: "Group",
            canon: "Group",
            kind: EntityKind::Group,
            fields: &[("Id", "id"), ("Name", "name"), ("Weeks", "weeks")],
        },
        ElementSpec {
            tag: "Teacher",
            canon: "Teacher",
            kind: EntityKind::Teacher,
            fields: &[
                ("Id", "id"),
                ("PersonnelId", "personnelId"),
                ("FirstName", "firstName"),
                ("LastName", "lastName"),
                ("BirthDate", "birthDate"),
                ("Weeks", "weeks"),
            ],
        },
        ElementSpec {
            tag: "Staff",
            canon: "Staff",
            kind: EntityKind::Staff,
            fields: &[
                ("Id", "id"),
                ("FirstName", "firstName"),
                ("LastName", "lastName"),
                ("Weeks", "weeks"),
            ],
        },
        ElementSpec {
            tag: "Student",
            canon: "Student",
            kind: EntityKind::Student,
            fields: &[("Id", "id")],
        },
        ElementSpec {
            tag: "Course",
            canon: "Course",
            kind: EntityKind::Course,
            fields: &[
                ("Day", "day"),
                ("StartSlot", "startSlot"),
                ("SlotCount", "slotCount"),
                ("CancelWeeks", "cancelWeeks"),
            ],
        },
    ],
};
