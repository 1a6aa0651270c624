//! The predefined `Standard` package
//!
//! Built with the same builder as user units so that its declarations are
//! ordinary nodes. The universal numeric types live in the package too but
//! are never inserted into an environment: no name denotes them.

use crate::entity::Entity;
use ferrada_syntax::{Ast, NodeId, NodeKind, SyntaxError, UniversalKind, UnitId, UnitKind};

pub const STANDARD_UNIT: &str = "standard";

const INTEGER_FIRST: i128 = -2_147_483_648;
const INTEGER_LAST: i128 = 2_147_483_647;

/// Declarations of `Standard` the core refers to directly
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Standard {
    pub unit: UnitId,
    pub package: NodeId,
    pub boolean: NodeId,
    pub integer: NodeId,
    pub natural: NodeId,
    pub positive: NodeId,
    pub float: NodeId,
    pub character: NodeId,
    pub string: NodeId,
    pub universal_int: NodeId,
    pub universal_real: NodeId,
}

impl Standard {
    pub fn build(ast: &mut Ast) -> Result<Self, SyntaxError> {
        let mut ids = None;
        let unit = ast.build_unit(STANDARD_UNIT, UnitKind::Spec, |b| {
            let boolean = b.type_decl("Boolean", b.enum_def(&["False", "True"]));
            let integer = b.type_decl("Integer", b.range_def(b.int(INTEGER_FIRST), b.int(INTEGER_LAST)));
            let natural = b.subtype_decl(
                "Natural",
                b.subtype_indication(b.name("Integer"), Some(b.range(b.int(0), b.int(INTEGER_LAST)))),
            );
            let positive = b.subtype_decl(
                "Positive",
                b.subtype_indication(b.name("Integer"), Some(b.range(b.int(1), b.int(INTEGER_LAST)))),
            );
            let float = b.type_decl("Float", b.float_def(b.int(15)));
            let character = b.type_decl("Character", b.enum_def(&[]));
            let string = b.type_decl(
                "String",
                b.array_def(vec![b.box_range(b.name("Positive"))], b.name("Character")),
            );
            let universal_int = b.type_decl("Universal_Integer", b.universal_def(UniversalKind::Integer));
            let universal_real = b.type_decl("Universal_Real", b.universal_def(UniversalKind::Real));

            let package = b.package(
                "Standard",
                vec![
                    boolean,
                    integer,
                    natural,
                    positive,
                    float,
                    character,
                    string,
                    universal_int,
                    universal_real,
                ],
                None,
            );
            ids = Some((
                package,
                [
                    boolean,
                    integer,
                    natural,
                    positive,
                    float,
                    character,
                    string,
                    universal_int,
                    universal_real,
                ],
            ));
            b.compilation_unit(vec![], package)
        })?;

        let Some((package, [boolean, integer, natural, positive, float, character, string, universal_int, universal_real])) = ids
        else {
            return Err(SyntaxError::InvalidRoot {
                found: "incomplete Standard package".to_string(),
            });
        };
        Ok(Self {
            unit,
            package,
            boolean,
            integer,
            natural,
            positive,
            float,
            character,
            string,
            universal_int,
            universal_real,
        })
    }

    pub fn boolean_type(&self) -> Entity {
        Entity::new(self.boolean)
    }

    pub fn integer_type(&self) -> Entity {
        Entity::new(self.integer)
    }

    pub fn float_type(&self) -> Entity {
        Entity::new(self.float)
    }

    pub fn character_type(&self) -> Entity {
        Entity::new(self.character)
    }

    pub fn string_type(&self) -> Entity {
        Entity::new(self.string)
    }

    pub fn universal_int_type(&self) -> Entity {
        Entity::new(self.universal_int)
    }

    pub fn universal_real_type(&self) -> Entity {
        Entity::new(self.universal_real)
    }
}

/// Whether a type declaration is one of the hidden universal types
pub fn is_universal_decl(ast: &Ast, decl: NodeId) -> bool {
    match ast.kind(decl) {
        NodeKind::TypeDecl { def, .. } => matches!(ast.kind(*def), NodeKind::UniversalTypeDef { .. }),
        _ => false,
    }
}
