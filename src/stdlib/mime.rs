//! The `mime` package: a `MimeType` extension class accepting registered
//! media types only.

use lazy_static::lazy_static;

use super::media_types::MEDIA_TYPES;
use crate::ast::Token;
use crate::error::{ErrorCode, SymbolError, SymbolResult};
use crate::symbols::{Class, ClassRef, Instance, Package, Value};

lazy_static! {
    static ref MIME_TYPE: SymbolResult<Class> = define_mime_type();
}

/// The `MimeType` class.
pub fn mime_type() -> SymbolResult<Class> {
    MIME_TYPE.clone()
}

/// Whether `s` names a registered media type. Matching ignores ASCII case.
pub fn is_media_type(s: &str) -> bool {
    MEDIA_TYPES.iter().any(|known| known.eq_ignore_ascii_case(s))
}

fn essence(instance: &Instance) -> SymbolResult<(String, String)> {
    let s = instance.payload.as_str()?;
    let (top, sub) = s.split_once('/').unwrap_or((s, ""));
    Ok((top.to_string(), sub.to_string()))
}

fn define_mime_type() -> SymbolResult<Class> {
    ClassRef::define("MimeType", |this, builder| {
        let mut builder = builder
            .constructor(Class::String, {
                let this = this.clone();
                move |s: String| {
                    if !is_media_type(&s) {
                        return Err(SymbolError::new(
                            ErrorCode::CannotConstruct,
                            format!("unknown mime type {}", s),
                        ));
                    }
                    Value::instance(&this, Value::String(s.to_ascii_lowercase()))
                }
            })
            .property("type", Class::String, |m: Instance| -> SymbolResult<String> {
                Ok(essence(&m)?.0)
            })
            .property("subtype", Class::String, |m: Instance| -> SymbolResult<String> {
                Ok(essence(&m)?.1)
            });
        for token in [Token::Equals, Token::NotEquals] {
            builder = builder.comparator(
                this.clone(),
                token,
                move |a: Instance, b: Instance| -> SymbolResult<bool> {
                    let same = a.payload == b.payload;
                    Ok(if token == Token::Equals { same } else { !same })
                },
            );
        }
        builder
    })
}

pub(super) fn package() -> SymbolResult<Package> {
    Ok(Package::new("mime").with("MimeType", mime_type()?))
}
