//! Host types shared by the integration tests.

#![allow(dead_code)]

use std::any::Any;
use std::sync::{Arc, RwLock};

use anise_lang::error::AccessError;
use anise_lang::resolve::StandardTypeLocator;
use anise_lang::types::{ConstructorInfo, FieldInfo, MethodInfo};
use anise_lang::{HostObject, StandardEvaluationContext, TypeBuilder, TypeRef, Value, builtins};
use once_cell::sync::Lazy;

#[derive(Debug)]
pub struct Address {
    pub city: String,
}

#[derive(Debug)]
pub struct Person {
    pub name: RwLock<String>,
    pub age: i32,
    pub address: Option<Value>,
}

pub static ADDRESS_TYPE: Lazy<TypeRef> = Lazy::new(|| {
    let b = builtins();
    TypeBuilder::class("demo.Address")
        .field(FieldInfo::new("city", &b.string, |target| {
            Ok(Value::string(address(target)?.city.clone()))
        }))
        .build()
});

pub static PERSON_TYPE: Lazy<TypeRef> = Lazy::new(|| {
    let b = builtins();
    TypeBuilder::class("demo.Person")
        .constructor(ConstructorInfo::new(
            vec![b.string.clone(), b.integer.clone()],
            |args| match args {
                [Value::String(name), Value::Int(age)] => Ok(person(name, *age)),
                _ => Err(AccessError::incompatible("expected (String, Integer)")),
            },
        ))
        .method(
            MethodInfo::new("getName", vec![], |target, _| {
                Ok(Value::string(this(target)?.name.read().unwrap().clone()))
            })
            .returning(&b.string),
        )
        .method(MethodInfo::new("setName", vec![b.string.clone()], |target, args| {
            let Some(Value::String(name)) = args.first() else {
                return Err(AccessError::incompatible("expected a string"));
            };
            *this(target)?.name.write().unwrap() = name.clone();
            Ok(Value::Null)
        }))
        .method(
            MethodInfo::new("getAge", vec![], |target, _| Ok(Value::Int(this(target)?.age)))
                .returning(&b.integer),
        )
        .method(
            MethodInfo::new("isAdult", vec![], |target, _| {
                Ok(Value::Boolean(this(target)?.age >= 18))
            })
            .returning(&b.boolean),
        )
        .method(
            MethodInfo::new("isRegistered", vec![], |_, _| Ok(Value::string("pending")))
                .returning(&b.string),
        )
        .method(MethodInfo::new("getAddress", vec![], |target, _| {
            Ok(this(target)?.address.clone().unwrap_or(Value::Null))
        }))
        .method(
            MethodInfo::new("greet", vec![b.string.clone()], |target, args| {
                let name = this(target)?.name.read().unwrap().clone();
                Ok(Value::String(format!("Hello {}, I am {}", args[0], name)))
            })
            .returning(&b.string),
        )
        .method(MethodInfo::new("describe", vec![b.object.clone()], |_, _| {
            Ok(Value::string("object"))
        }))
        .method(MethodInfo::new("describe", vec![b.string.clone()], |_, _| {
            Ok(Value::string("string"))
        }))
        .method(MethodInfo::new("weigh", vec![b.object.clone()], |_, _| {
            Ok(Value::string("object"))
        }))
        .method(MethodInfo::new("weigh", vec![b.number.clone()], |_, _| {
            Ok(Value::string("number"))
        }))
        .method(MethodInfo::new("fail", vec![], |_, _| {
            Err(AccessError::invocation("boom"))
        }))
        .build()
});

impl HostObject for Address {
    fn runtime_type(&self) -> TypeRef {
        ADDRESS_TYPE.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl HostObject for Person {
    fn runtime_type(&self) -> TypeRef {
        PERSON_TYPE.clone()
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

fn this(target: &Value) -> Result<&Person, AccessError> {
    target
        .downcast_ref::<Person>()
        .ok_or_else(|| AccessError::incompatible(format!("not a person: {}", target.type_name())))
}

fn address(target: &Value) -> Result<&Address, AccessError> {
    target
        .downcast_ref::<Address>()
        .ok_or_else(|| AccessError::incompatible(format!("not an address: {}", target.type_name())))
}

pub fn person(name: &str, age: i32) -> Value {
    Value::object(Person {
        name: RwLock::new(name.to_string()),
        age,
        address: None,
    })
}

pub fn person_in(name: &str, age: i32, city: &str) -> Value {
    Value::object(Person {
        name: RwLock::new(name.to_string()),
        age,
        address: Some(Value::object(Address {
            city: city.to_string(),
        })),
    })
}

/// A standard context whose type locator also knows the `demo` types.
pub fn context_with(root: Value) -> StandardEvaluationContext {
    let locator = StandardTypeLocator::new();
    locator.register_type(&PERSON_TYPE);
    locator.register_type(&ADDRESS_TYPE);
    locator.register_import("demo");
    let mut ctx = StandardEvaluationContext::with_root(root);
    ctx.set_type_locator(Arc::new(locator));
    ctx
}
