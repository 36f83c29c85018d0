// SPDX-FileCopyrightText: 2025-2026 RAprogramm <andrey.rozanov.vl@gmail.com>
// SPDX-License-Identifier: MIT

//! Relationship management (spec §4.8).
//!
//! Relationships never gain their own row; they materialize as a VARCHAR
//! column on one side (one-to-one, one-to-many, many-to-one) or a junction
//! table (many-to-many). This module computes the DDL deltas —
//! [`RelationshipDdl`] — for create/update/delete; the concrete backend's
//! `ddl` module renders them into `ALTER TABLE` statements, grounded on the
//! teacher's `REFERENCES {parent_table}(id) ON DELETE {action}` emission in
//! `entity-derive-impl/src/entity/migrations/postgres/ddl.rs`.

use docbase_core::{AdapterError, ErrorKind};

use crate::identifier::junction_table_name;

/// The four relationship kinds (spec §4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipType {
    OneToOne,
    OneToMany,
    ManyToOne,
    ManyToMany
}

/// Which collection declared the relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipSide {
    Parent,
    Child
}

/// The column type every relationship column uses (spec §4.8: "Column type
/// for all relationship columns is VARCHAR(255)").
pub const RELATIONSHIP_COLUMN_TYPE: &str = "VARCHAR(255)";

/// A relationship as declared by the façade.
#[derive(Debug, Clone)]
pub struct RelationshipSpec {
    /// The relationship kind.
    pub kind: RelationshipType,
    /// The column name holding the related id (or, for one-to-many, the
    /// child's `twoWayKey` column name).
    pub key: String,
    /// When `true`, the non-owning side also gets a mirror column.
    pub two_way: bool,
    /// The mirror column's name, required when `two_way` is `true`.
    pub two_way_key: Option<String>,
    /// The parent collection's `$internalId`, used to name the junction
    /// table for many-to-many relationships.
    pub parent_internal_id: i64,
    /// The child collection's `$internalId`.
    pub child_internal_id: i64
}

/// One column-level DDL delta on a specific side's table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnDelta {
    /// Add a new `VARCHAR(255)` column.
    Add { side: RelationshipSideMarker, name: String },
    /// Rename an existing relationship column.
    Rename {
        side: RelationshipSideMarker,
        from: String,
        to: String
    },
    /// Drop an existing relationship column.
    Drop { side: RelationshipSideMarker, name: String }
}

/// `RelationshipSide` without the associated data, usable as an enum map
/// key / equality target in [`ColumnDelta`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationshipSideMarker {
    Parent,
    Child
}

impl From<RelationshipSide> for RelationshipSideMarker {
    fn from(side: RelationshipSide) -> Self {
        match side {
            RelationshipSide::Parent => Self::Parent,
            RelationshipSide::Child => Self::Child
        }
    }
}

/// The full set of DDL deltas a relationship operation produces: column
/// changes plus, for many-to-many, the junction table name to create or
/// drop.
#[derive(Debug, Clone, Default)]
pub struct RelationshipDdl {
    /// Column-level changes on the parent/child tables.
    pub columns: Vec<ColumnDelta>,
    /// The junction table name, present only for many-to-many
    /// relationships.
    pub junction_table: Option<String>
}

/// Compute the DDL deltas for `createRelationship` (spec §4.8).
pub fn create_ddl(spec: &RelationshipSpec) -> RelationshipDdl {
    match spec.kind {
        RelationshipType::OneToOne => {
            let mut columns = vec![ColumnDelta::Add {
                side: RelationshipSideMarker::Parent,
                name: spec.key.clone()
            }];
            if spec.two_way {
                if let Some(mirror) = &spec.two_way_key {
                    columns.push(ColumnDelta::Add {
                        side: RelationshipSideMarker::Child,
                        name: mirror.clone()
                    });
                }
            }
            RelationshipDdl {
                columns,
                junction_table: None
            }
        }
        RelationshipType::ManyToOne => RelationshipDdl {
            columns: vec![ColumnDelta::Add {
                side: RelationshipSideMarker::Parent,
                name: spec.key.clone()
            }],
            junction_table: None
        },
        RelationshipType::OneToMany => RelationshipDdl {
            columns: vec![ColumnDelta::Add {
                side: RelationshipSideMarker::Child,
                name: spec.key.clone()
            }],
            junction_table: None
        },
        RelationshipType::ManyToMany => RelationshipDdl {
            columns: Vec::new(),
            junction_table: Some(junction_table_name(spec.parent_internal_id, spec.child_internal_id))
        }
    }
}

/// Compute the DDL deltas for `updateRelationship`: a pure rename of the
/// existing column(s), never changing kind or sides.
pub fn update_ddl(spec: &RelationshipSpec, new_key: Option<&str>, new_two_way_key: Option<&str>) -> Result<RelationshipDdl, AdapterError> {
    if spec.kind == RelationshipType::ManyToMany {
        if new_key.is_some() {
            return Err(AdapterError::new(
                ErrorKind::Validation,
                "many-to-many relationships have no column to rename"
            ));
        }
        return Ok(RelationshipDdl::default());
    }

    let owning_side = match spec.kind {
        RelationshipType::OneToOne | RelationshipType::ManyToOne => RelationshipSideMarker::Parent,
        RelationshipType::OneToMany => RelationshipSideMarker::Child,
        RelationshipType::ManyToMany => unreachable!("handled above")
    };

    let mut columns = Vec::new();
    if let Some(new_key) = new_key {
        columns.push(ColumnDelta::Rename {
            side: owning_side,
            from: spec.key.clone(),
            to: new_key.to_string()
        });
    }
    if let (true, Some(current), Some(new_mirror)) = (spec.two_way, spec.two_way_key.as_deref(), new_two_way_key) {
        columns.push(ColumnDelta::Rename {
            side: RelationshipSideMarker::Child,
            from: current.to_string(),
            to: new_mirror.to_string()
        });
    }

    Ok(RelationshipDdl {
        columns,
        junction_table: None
    })
}

/// Compute the DDL deltas for `deleteRelationship`: drop the owning
/// column(s), or the junction table for many-to-many.
pub fn delete_ddl(spec: &RelationshipSpec) -> RelationshipDdl {
    match spec.kind {
        RelationshipType::ManyToMany => RelationshipDdl {
            columns: Vec::new(),
            junction_table: Some(junction_table_name(spec.parent_internal_id, spec.child_internal_id))
        },
        RelationshipType::OneToOne => {
            let mut columns = vec![ColumnDelta::Drop {
                side: RelationshipSideMarker::Parent,
                name: spec.key.clone()
            }];
            if let Some(mirror) = &spec.two_way_key {
                columns.push(ColumnDelta::Drop {
                    side: RelationshipSideMarker::Child,
                    name: mirror.clone()
                });
            }
            RelationshipDdl {
                columns,
                junction_table: None
            }
        }
        RelationshipType::ManyToOne => RelationshipDdl {
            columns: vec![ColumnDelta::Drop {
                side: RelationshipSideMarker::Parent,
                name: spec.key.clone()
            }],
            junction_table: None
        },
        RelationshipType::OneToMany => RelationshipDdl {
            columns: vec![ColumnDelta::Drop {
                side: RelationshipSideMarker::Child,
                name: spec.key.clone()
            }],
            junction_table: None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(kind: RelationshipType) -> RelationshipSpec {
        RelationshipSpec {
            kind,
            key: "authorId".to_string(),
            two_way: false,
            two_way_key: None,
            parent_internal_id: 4,
            child_internal_id: 9
        }
    }

    #[test]
    fn many_to_many_create_only_makes_a_junction_table() {
        let ddl = create_ddl(&spec(RelationshipType::ManyToMany));
        assert!(ddl.columns.is_empty());
        assert_eq!(ddl.junction_table.as_deref(), Some("_4_9"));
    }

    #[test]
    fn one_to_many_adds_column_on_child() {
        let ddl = create_ddl(&spec(RelationshipType::OneToMany));
        assert_eq!(
            ddl.columns,
            vec![ColumnDelta::Add {
                side: RelationshipSideMarker::Child,
                name: "authorId".to_string()
            }]
        );
    }

    #[test]
    fn one_to_one_two_way_adds_mirror_column() {
        let mut s = spec(RelationshipType::OneToOne);
        s.two_way = true;
        s.two_way_key = Some("profileId".to_string());
        let ddl = create_ddl(&s);
        assert_eq!(ddl.columns.len(), 2);
    }

    #[test]
    fn update_renames_owning_column() {
        let ddl = update_ddl(&spec(RelationshipType::ManyToOne), Some("ownerId"), None).unwrap();
        assert_eq!(
            ddl.columns,
            vec![ColumnDelta::Rename {
                side: RelationshipSideMarker::Parent,
                from: "authorId".to_string(),
                to: "ownerId".to_string()
            }]
        );
    }

    #[test]
    fn update_rejects_rename_on_many_to_many() {
        assert!(update_ddl(&spec(RelationshipType::ManyToMany), Some("x"), None).is_err());
    }

    #[test]
    fn delete_drops_owning_column() {
        let ddl = delete_ddl(&spec(RelationshipType::ManyToOne));
        assert_eq!(
            ddl.columns,
            vec![ColumnDelta::Drop {
                side: RelationshipSideMarker::Parent,
                name: "authorId".to_string()
            }]
        );
    }

    #[test]
    fn delete_many_to_many_drops_junction_table() {
        let ddl = delete_ddl(&spec(RelationshipType::ManyToMany));
        assert_eq!(ddl.junction_table.as_deref(), Some("_4_9"));
    }
}
