use crate::error::SymbolResult;
use crate::symbols::{Class, ErrorValue, Function, Package};

/// Constructors for `Error` values with a fixed name.
const NAMED: [&str; 4] = ["BadRequest", "NotFound", "Unauthorized", "InternalError"];

pub(super) fn package() -> SymbolResult<Package> {
    let mut package = Package::new("errors").with_callable(
        "New",
        Function::native(
            vec![Class::String, Class::String],
            Some(Class::Error),
            |name: String, message: String| Ok(ErrorValue::new(&name, &message)),
        )?,
    );
    for name in NAMED {
        let function = Function::native(
            vec![Class::String],
            Some(Class::Error),
            move |message: String| Ok(ErrorValue::new(name, &message)),
        )?;
        package = package.with_callable(name, function);
    }
    Ok(package)
}
