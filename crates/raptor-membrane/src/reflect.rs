//! Ordinary semantics of the five operations.
//!
//! On a raw object these act on its property map and native closures. On a
//! replica from another membrane they go through that replica's own traps,
//! which is how membranes stack.

use crate::error::TrapError;
use crate::replica::Replicable;
use crate::value::{PropertyKey, Value};

/// Own-property read; missing keys read as `undefined`.
pub fn get(target: &Replicable, key: &PropertyKey) -> Result<Value, TrapError> {
    match target {
        Replicable::Object(object) => Ok(object.get_own(key).unwrap_or_default()),
        Replicable::Replica(replica) => replica.get(key.clone()),
    }
}

/// Own-property write; `false` when the target rejects it.
pub fn set(target: &Replicable, key: &PropertyKey, value: Value) -> Result<bool, TrapError> {
    match target {
        Replicable::Object(object) => Ok(object.insert(key.clone(), value)),
        Replicable::Replica(replica) => replica.set(key.clone(), value),
    }
}

pub fn delete_property(target: &Replicable, key: &PropertyKey) -> Result<bool, TrapError> {
    match target {
        Replicable::Object(object) => Ok(object.remove(key)),
        Replicable::Replica(replica) => replica.delete(key.clone()),
    }
}

pub fn apply(target: &Replicable, this_arg: Value, args: Vec<Value>) -> Result<Value, TrapError> {
    match target {
        Replicable::Object(object) => object.call(this_arg, args),
        Replicable::Replica(replica) if !replica.is_callable() => {
            Err(TrapError::NotCallable(Value::from(replica.clone()).to_string()))
        }
        Replicable::Replica(replica) => replica.call(this_arg, args),
    }
}

pub fn construct(
    target: &Replicable,
    args: Vec<Value>,
    new_target: Value,
) -> Result<Value, TrapError> {
    match target {
        Replicable::Object(object) => object.construct(args, new_target),
        Replicable::Replica(replica) if !replica.is_constructor() => {
            Err(TrapError::NotConstructor(Value::from(replica.clone()).to_string()))
        }
        Replicable::Replica(replica) => replica.construct_with(args, new_target),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MembraneConfig;
    use crate::handler::ForwardingHandler;
    use crate::membrane::Membrane;
    use crate::object::ObjectRef;

    #[test]
    fn missing_property_reads_undefined() {
        let target = Replicable::Object(ObjectRef::new());
        assert_eq!(get(&target, &"nope".into()).unwrap(), Value::Undefined);
    }

    #[test]
    fn set_then_delete_round_trips_on_the_object() {
        let object = ObjectRef::new();
        let target = Replicable::Object(object.clone());
        assert!(set(&target, &"k".into(), Value::from(5)).unwrap());
        assert_eq!(object.get_own(&"k".into()), Some(Value::from(5)));
        assert!(delete_property(&target, &"k".into()).unwrap());
        assert!(!object.has_own(&"k".into()));
    }

    #[test]
    fn apply_passes_receiver_and_arguments() {
        let f = ObjectRef::function("first", |this, args| {
            Ok(args.into_iter().next().unwrap_or(this))
        });
        let target = Replicable::Object(f);
        assert_eq!(
            apply(&target, Value::from("this"), vec![Value::from(1)]).unwrap(),
            Value::from(1)
        );
        assert_eq!(
            apply(&target, Value::from("this"), vec![]).unwrap(),
            Value::from("this")
        );
    }

    #[test]
    fn construct_uses_construct_behaviour() {
        let point = ObjectRef::constructor(
            "Point",
            |_, _| Err(TrapError::Type("Class constructor Point cannot be invoked without 'new'".into())),
            |args, _| {
                let instance = ObjectRef::new();
                instance.insert("x", args.first().cloned().unwrap_or_default());
                Ok(Value::from(instance))
            },
        );
        let target = Replicable::Object(point);
        let made = construct(&target, vec![Value::from(3)], Value::Undefined).unwrap();
        let instance = made.as_object().expect("object");
        assert_eq!(instance.get_own(&"x".into()), Some(Value::from(3)));
        assert!(matches!(
            apply(&target, Value::Undefined, vec![]),
            Err(TrapError::Type(_))
        ));
    }

    #[test]
    fn foreign_replicas_keep_call_and_construct_capabilities() {
        let membrane = Membrane::with_config(ForwardingHandler, MembraneConfig::default());
        let plain = membrane.replica(ObjectRef::new());
        let f = membrane.replica(ObjectRef::function("f", |_, _| Ok(Value::Null)));
        let plain = Replicable::Replica(plain.as_replica().expect("replica").clone());
        let f = Replicable::Replica(f.as_replica().expect("replica").clone());

        assert!(!plain.is_callable());
        assert!(!plain.is_constructor());
        assert!(f.is_callable());
        assert!(!f.is_constructor());

        assert!(matches!(
            apply(&plain, Value::Undefined, vec![]),
            Err(TrapError::NotCallable(_))
        ));
        assert!(matches!(
            construct(&plain, vec![], Value::Undefined),
            Err(TrapError::NotConstructor(_))
        ));
        assert!(matches!(
            construct(&f, vec![], Value::Undefined),
            Err(TrapError::NotConstructor(_))
        ));
        assert_eq!(apply(&f, Value::Undefined, vec![]).unwrap(), Value::Null);
        assert_eq!(membrane.metrics().total_traps(), 1);
    }
}
