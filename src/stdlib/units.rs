//! The `units` package: a `Dimension` extension class holding a mutable
//! width and height.

use std::collections::BTreeMap;

use lazy_static::lazy_static;

use crate::error::{ErrorCode, SymbolError, SymbolResult};
use crate::symbols::{Class, ClassRef, Instance, MapValue, Package, Value};

const AXES: [&str; 2] = ["width", "height"];

lazy_static! {
    static ref DIMENSION: SymbolResult<Class> = define_dimension();
}

/// The `Dimension` class.
pub fn dimension() -> SymbolResult<Class> {
    DIMENSION.clone()
}

fn fields(instance: &Instance) -> SymbolResult<&MapValue> {
    match &*instance.payload {
        Value::Map(map) => Ok(map),
        other => Err(SymbolError::new(
            ErrorCode::InvalidClass,
            format!("Dimension holds {:?}", other),
        )),
    }
}

fn axis(instance: &Instance, key: &str) -> SymbolResult<Value> {
    let value = fields(instance)?.get(key).map(|v| v.as_f64()).transpose()?;
    Ok(Value::Float(value.unwrap_or_default()))
}

fn define_dimension() -> SymbolResult<Class> {
    ClassRef::define("Dimension", |this, builder| {
        let mut builder = builder.record_constructor({
            let this = this.clone();
            move |values: BTreeMap<String, Value>| {
                Value::instance(&this, Value::Map(MapValue::new(values)))
            }
        });
        for key in AXES {
            builder = builder
                .property(key, Class::Float, move |d: Instance| axis(&d, key))
                .setter(key, move |d: Instance, n: f64| -> SymbolResult<()> {
                    fields(&d)?.set(key, Value::Float(n));
                    Ok(())
                });
        }
        builder.method(
            "area",
            vec![],
            Some(Class::Float),
            |d: Instance| -> SymbolResult<Value> {
                let width = axis(&d, "width")?.as_f64()?;
                let height = axis(&d, "height")?.as_f64()?;
                Ok(Value::Float(width * height))
            },
        )
    })
}

pub(super) fn package() -> SymbolResult<Package> {
    Ok(Package::new("units").with("Dimension", dimension()?))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbols::construct;

    fn record(width: Value, height: Value) -> Value {
        let mut fields = BTreeMap::new();
        fields.insert("width".to_string(), width);
        fields.insert("height".to_string(), height);
        Value::Map(MapValue::new(fields))
    }

    #[test]
    fn test_construct_from_record() {
        let class = dimension().unwrap();
        let d = construct(&class, record(Value::Integer(3), Value::Float(1.5))).unwrap();
        assert_eq!(d.class(), class);
        let width = class.descriptors().property("width").cloned().unwrap();
        assert_eq!((width.getter)(&d).unwrap(), Value::Float(3.0));
    }

    #[test]
    fn test_setter_mutates_instance() {
        let class = dimension().unwrap();
        let d = construct(&class, record(Value::Float(1.0), Value::Float(2.0))).unwrap();
        let height = class.descriptors().property("height").cloned().unwrap();
        let setter = height.setter.clone().unwrap();
        setter(&d, Value::Float(8.0)).unwrap();
        assert_eq!((height.getter)(&d).unwrap(), Value::Float(8.0));
    }

    #[test]
    fn test_missing_axis_fails_construction() {
        let class = dimension().unwrap();
        let mut fields = BTreeMap::new();
        fields.insert("width".to_string(), Value::Float(1.0));
        assert!(construct(&class, Value::Map(MapValue::new(fields))).is_err());
    }

    #[test]
    fn test_area() {
        let class = dimension().unwrap();
        let d = construct(&class, record(Value::Float(2.0), Value::Float(4.5))).unwrap();
        let area = class.descriptors().prototype.get("area").cloned().unwrap();
        let result = area.bind(d).invoke(vec![]).unwrap();
        assert_eq!(result, Some(Value::Float(9.0)));
    }
}
