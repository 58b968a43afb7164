use std::cell::RefCell;
use std::rc::Rc;

use crate::engine::{HookError, RawValue};

use super::ScriptEngine;
use super::builtins;
use super::env::{self, Env, Scope};
use super::expression::Expression;
use super::hash_key::HashKey;
use super::statement::{Block, Statement};
use super::value::{Closure, Code, ComplexParts, HashTable, HostCallable, Value, numify};

/// Non-local exits out of the evaluator.
#[derive(Debug)]
pub enum Unwind {
    Return(Value),
    Die(Value),
}

pub type Flow<T> = Result<T, Unwind>;

/// Restores call depth and current line when a call frame ends, including
/// when a host callback unwinds through the evaluator.
struct FrameGuard<'a> {
    engine: &'a ScriptEngine,
    depth: usize,
    line: usize,
}

impl Drop for FrameGuard<'_> {
    fn drop(&mut self) {
        self.engine.depth.set(self.depth);
        self.engine.line.set(self.line);
    }
}

enum Num {
    Int(i64),
    Float(f64),
}

impl ScriptEngine {
    /// Appends ` at <source> line N.` unless the message already ends a line.
    pub(crate) fn annotate(&self, message: impl Into<String>) -> String {
        let message = message.into();
        if message.ends_with('\n') {
            message
        } else {
            format!(
                "{} at {} line {}.\n",
                message,
                self.source_name,
                self.line.get()
            )
        }
    }

    pub(crate) fn die<T>(&self, message: impl Into<String>) -> Flow<T> {
        let text = self.annotate(message);
        Err(Unwind::Die(self.string(text)))
    }

    pub(crate) fn run_program(&self, program: &Block) -> Flow<Value> {
        match self.eval_block(program, &self.globals) {
            Err(Unwind::Return(value)) => Ok(value),
            other => other,
        }
    }

    fn eval_block(&self, block: &Block, env: &Env) -> Flow<Value> {
        let mut last = Value::Undef;
        for statement in &block.statements {
            last = self.eval_statement(statement, env)?;
        }
        Ok(last)
    }

    fn eval_statement(&self, statement: &Statement, env: &Env) -> Flow<Value> {
        self.line.set(statement.position().line);

        match statement {
            Statement::Let { name, value, .. } => {
                let value = self.eval_expression(value, env)?.into_scalar();
                env.borrow_mut().define(name.clone(), value);
                Ok(Value::Undef)
            }
            Statement::Assign { target, value, .. } => {
                let value = self.eval_expression(value, env)?.into_scalar();
                self.assign(target, value, env)?;
                Ok(Value::Undef)
            }
            Statement::Return { value, .. } => {
                let value = match value {
                    Some(expression) => self.eval_expression(expression, env)?,
                    None => Value::List(Rc::from(Vec::new())),
                };
                Err(Unwind::Return(value))
            }
            Statement::While {
                condition, body, ..
            } => {
                while self.eval_expression(condition, env)?.is_truthy() {
                    let scope = Scope::child(env);
                    self.eval_block(body, &scope)?;
                }
                Ok(Value::Undef)
            }
            Statement::Expression { expression, .. } => self.eval_expression(expression, env),
        }
    }

    fn eval_expression(&self, expression: &Expression, env: &Env) -> Flow<Value> {
        match expression {
            Expression::Identifier(name) => match env::lookup(env, name) {
                Some(value) => Ok(value),
                None => match builtins::lookup(name) {
                    Some(builtin) => Ok(Value::Code(self.live.track(Code::Builtin(builtin)))),
                    None => self.die(format!("undefined variable `{}`", name)),
                },
            },
            Expression::Integer(value) => Ok(Value::Int(*value)),
            Expression::Float(value) => Ok(Value::Float(*value)),
            Expression::String(value) => Ok(self.string(value.clone())),
            Expression::Boolean(value) => Ok(Value::Bool(*value)),
            Expression::Nil => Ok(Value::Undef),
            Expression::Prefix { operator, right } => {
                let right = self.eval_expression(right, env)?.into_scalar();
                self.eval_prefix(operator, right)
            }
            Expression::Infix {
                left,
                operator,
                right,
            } => {
                let left = self.eval_expression(left, env)?.into_scalar();
                match operator.as_str() {
                    "&&" if !left.is_truthy() => return Ok(Value::Bool(false)),
                    "||" if left.is_truthy() => return Ok(Value::Bool(true)),
                    "&&" | "||" => {
                        let right = self.eval_expression(right, env)?.into_scalar();
                        return Ok(Value::Bool(right.is_truthy()));
                    }
                    _ => {}
                }
                let right = self.eval_expression(right, env)?.into_scalar();
                self.eval_infix(operator, left, right)
            }
            Expression::If {
                condition,
                consequence,
                alternative,
            } => {
                let condition = self.eval_expression(condition, env)?;
                if condition.is_truthy() {
                    self.eval_block(consequence, &Scope::child(env))
                } else if let Some(alternative) = alternative {
                    self.eval_block(alternative, &Scope::child(env))
                } else {
                    Ok(Value::Undef)
                }
            }
            Expression::Function { parameters, body } => {
                Ok(Value::Code(self.live.track(Code::Closure(Closure {
                    parameters: Rc::clone(parameters),
                    body: Rc::clone(body),
                    env: Rc::clone(env),
                }))))
            }
            Expression::Call {
                function,
                arguments,
            } => {
                let callee = self.eval_expression(function, env)?.into_scalar();
                let args = self.eval_list(arguments, env)?;
                self.call_value(&callee, args)
            }
            Expression::Array { elements } => {
                let items = self.eval_list(elements, env)?;
                Ok(self.array(items))
            }
            Expression::Hash { pairs } => {
                let mut table = HashTable::default();
                for (key, value) in pairs {
                    let key = self.eval_expression(key, env)?.into_scalar();
                    let value = self.eval_expression(value, env)?.into_scalar();
                    table.entries.insert(HashKey::from_value(&key), value);
                }
                Ok(self.hash(table))
            }
            Expression::Index { left, index } => {
                let container = self.eval_expression(left, env)?.into_scalar();
                let index = self.eval_expression(index, env)?.into_scalar();
                self.index_value(&container, &index)
            }
            Expression::Member { object, name } => {
                let container = self.eval_expression(object, env)?.into_scalar();
                match &container {
                    Value::Hash(_) => self.index_value(&container, &self.string(name.clone())),
                    other => self.die(format!(
                        "Can't access member \"{}\" of {}",
                        name,
                        other.type_name()
                    )),
                }
            }
            Expression::MethodCall {
                object,
                name,
                arguments,
            } => {
                let invocant = self.eval_expression(object, env)?.into_scalar();
                let args = self.eval_list(arguments, env)?;
                self.call_method_value(&invocant, name, args, 1)
            }
            Expression::List { elements } => {
                let items = self.eval_list(elements, env)?;
                Ok(Value::List(Rc::from(items)))
            }
        }
    }

    /// Evaluates expressions left to right, flattening multi-value results.
    fn eval_list(&self, expressions: &[Expression], env: &Env) -> Flow<Vec<Value>> {
        let mut values = Vec::with_capacity(expressions.len());
        for expression in expressions {
            match self.eval_expression(expression, env)? {
                Value::List(items) => values.extend(items.iter().cloned()),
                value => values.push(value),
            }
        }
        Ok(values)
    }

    fn eval_prefix(&self, operator: &str, right: Value) -> Flow<Value> {
        match operator {
            "!" => Ok(Value::Bool(!right.is_truthy())),
            "-" => match right {
                Value::Complex(c) => Ok(self.complex(-c.re, -c.im)),
                other => match to_num(&other) {
                    Num::Int(v) => Ok(v
                        .checked_neg()
                        .map_or(Value::Float(-(v as f64)), Value::Int)),
                    Num::Float(v) => Ok(Value::Float(-v)),
                },
            },
            _ => self.die(format!("unknown operator: {}{}", operator, right.type_name())),
        }
    }

    fn eval_infix(&self, operator: &str, left: Value, right: Value) -> Flow<Value> {
        match operator {
            "==" => return Ok(Value::Bool(loose_eq(&left, &right))),
            "!=" => return Ok(Value::Bool(!loose_eq(&left, &right))),
            "<" | ">" | "<=" | ">=" => return Ok(Value::Bool(compare(operator, &left, &right))),
            _ => {}
        }

        if let (Value::Complex(_), _) | (_, Value::Complex(_)) = (&left, &right) {
            return self.complex_arith(operator, &left, &right);
        }

        if operator == "+" && (matches!(left, Value::Str(_)) || matches!(right, Value::Str(_))) {
            let mut text = left.to_display();
            text.push_str(&right.to_display());
            return Ok(self.string(text));
        }

        match (to_num(&left), to_num(&right)) {
            (Num::Int(a), Num::Int(b)) => self.int_arith(operator, a, b),
            (a, b) => self.float_arith(operator, a.as_f64(), b.as_f64()),
        }
    }

    fn int_arith(&self, operator: &str, a: i64, b: i64) -> Flow<Value> {
        let checked = match operator {
            "+" => a.checked_add(b),
            "-" => a.checked_sub(b),
            "*" => a.checked_mul(b),
            "/" => {
                if b == 0 {
                    return self.die("Illegal division by zero");
                }
                a.checked_div(b)
            }
            "%" => {
                if b == 0 {
                    return self.die("Illegal modulus zero");
                }
                a.checked_rem(b)
            }
            _ => return self.die(format!("unknown operator: Int {} Int", operator)),
        };
        match checked {
            Some(v) => Ok(Value::Int(v)),
            // Overflow degrades to floating point
            None => self.float_arith(operator, a as f64, b as f64),
        }
    }

    fn float_arith(&self, operator: &str, a: f64, b: f64) -> Flow<Value> {
        let value = match operator {
            "+" => a + b,
            "-" => a - b,
            "*" => a * b,
            "/" => {
                if b == 0.0 {
                    return self.die("Illegal division by zero");
                }
                a / b
            }
            "%" => {
                if b == 0.0 {
                    return self.die("Illegal modulus zero");
                }
                a % b
            }
            _ => return self.die(format!("unknown operator: Float {} Float", operator)),
        };
        Ok(Value::Float(value))
    }

    fn complex_arith(&self, operator: &str, left: &Value, right: &Value) -> Flow<Value> {
        let a = complex_parts(left);
        let b = complex_parts(right);
        let (re, im) = match operator {
            "+" => (a.re + b.re, a.im + b.im),
            "-" => (a.re - b.re, a.im - b.im),
            "*" => (a.re * b.re - a.im * b.im, a.re * b.im + a.im * b.re),
            "/" => {
                let denom = b.re * b.re + b.im * b.im;
                if denom == 0.0 {
                    return self.die("Illegal division by zero");
                }
                (
                    (a.re * b.re + a.im * b.im) / denom,
                    (a.im * b.re - a.re * b.im) / denom,
                )
            }
            _ => return self.die(format!("unknown operator: Complex {} Complex", operator)),
        };
        Ok(self.complex(re, im))
    }

    /// Calls a code value with already evaluated arguments.
    pub(crate) fn call_value(&self, callee: &Value, args: Vec<Value>) -> Flow<Value> {
        let Value::Code(code) = callee else {
            return self.die(format!("Not a CODE reference ({})", callee.type_name()));
        };

        let depth = self.depth.get();
        if depth >= self.max_call_depth {
            return self.die("deep recursion limit exceeded");
        }
        let _frame = FrameGuard {
            engine: self,
            depth,
            line: self.line.get(),
        };
        self.depth.set(depth + 1);

        match &***code {
            Code::Closure(closure) => self.call_closure(closure, args),
            Code::Builtin(builtin) => (builtin.func)(self, args),
            Code::Host(host) => self.call_host(host, args),
        }
    }

    fn call_closure(&self, closure: &Closure, args: Vec<Value>) -> Flow<Value> {
        let scope = Scope::child(&closure.env);
        {
            let mut frame = scope.borrow_mut();
            for (i, parameter) in closure.parameters.iter().enumerate() {
                frame.define(parameter.clone(), args.get(i).cloned().unwrap_or(Value::Undef));
            }
            frame.define("args", self.array(args));
        }

        match self.eval_block(&closure.body, &scope) {
            Err(Unwind::Return(value)) => Ok(value),
            other => other,
        }
    }

    fn call_host(&self, host: &HostCallable, args: Vec<Value>) -> Flow<Value> {
        if args.len() != host.inputs {
            return self.die(format!(
                "host function expects {} argument(s), got {}",
                host.inputs,
                args.len()
            ));
        }
        let Some(hooks) = &host.link.hooks else {
            return self.die("host function is detached");
        };

        let raws = self.store_all(args);
        let outcome = hooks.invoke(host.link.id, &raws, host.outputs);
        self.release_all(&raws);
        self.hook_results(outcome)
    }

    pub(crate) fn call_method_value(
        &self,
        invocant: &Value,
        name: &str,
        args: Vec<Value>,
        outputs: usize,
    ) -> Flow<Value> {
        let Value::Hash(table) = invocant else {
            return self.die(format!(
                "Can't call method \"{}\" on {}",
                name,
                invocant.type_name()
            ));
        };

        let proxy = table
            .borrow()
            .proxy
            .as_ref()
            .map(|link| (link.id, link.hooks.clone()));
        if let Some((id, hooks)) = proxy {
            let Some(hooks) = hooks else {
                return self.die("host object is detached");
            };
            let raws = self.store_all(args);
            let outcome = hooks.call_method(id, name, &raws, outputs);
            self.release_all(&raws);
            return self.hook_results(outcome);
        }

        let method = table
            .borrow()
            .entries
            .get(&HashKey::String(name.to_string()))
            .cloned();
        match method {
            Some(code @ Value::Code(_)) => {
                let mut full = Vec::with_capacity(args.len() + 1);
                full.push(invocant.clone());
                full.extend(args);
                self.call_value(&code, full)
            }
            _ => self.die(format!("Can't locate method \"{}\"", name)),
        }
    }

    fn hook_results(&self, outcome: Result<Vec<RawValue>, HookError>) -> Flow<Value> {
        match outcome {
            Ok(raws) => {
                let mut values: Vec<Value> = raws.into_iter().map(|raw| self.take(raw)).collect();
                Ok(match values.len() {
                    0 => Value::Undef,
                    1 => values.remove(0),
                    _ => Value::List(Rc::from(values)),
                })
            }
            Err(err) => Err(self.hook_error(err)),
        }
    }

    fn hook_error(&self, err: HookError) -> Unwind {
        match err {
            HookError::Raise(raw) => Unwind::Die(self.take(raw)),
            HookError::Message(message) => Unwind::Die(self.string(self.annotate(message))),
        }
    }

    /// Resolves proxy fields to their current host value.
    pub(crate) fn materialize(&self, value: Value) -> Flow<Value> {
        let Value::Field(stub) = &value else {
            return Ok(value);
        };
        let Some(hooks) = &stub.link.hooks else {
            return Ok(Value::Undef);
        };
        match hooks.get_field(stub.link.id, &stub.name) {
            Ok(raw) => Ok(self.take(raw)),
            Err(err) => Err(self.hook_error(err)),
        }
    }

    fn index_value(&self, container: &Value, index: &Value) -> Flow<Value> {
        match container {
            Value::Array(items) => {
                let items = items.borrow();
                let len = items.len() as i64;
                let mut i = index.to_int();
                if i < 0 {
                    i += len;
                }
                Ok(if (0..len).contains(&i) {
                    items[i as usize].clone()
                } else {
                    Value::Undef
                })
            }
            Value::Hash(table) => {
                let key = HashKey::from_value(index);
                let (found, restricted) = {
                    let table = table.borrow();
                    (table.entries.get(&key).cloned(), table.proxy.is_some())
                };
                match found {
                    Some(value) => self.materialize(value),
                    None if restricted => self.die(format!(
                        "Attempt to access disallowed key '{}' in a restricted hash",
                        key.as_name()
                    )),
                    None => Ok(Value::Undef),
                }
            }
            other => self.die(format!(
                "Not an ARRAY or HASH reference ({})",
                other.type_name()
            )),
        }
    }

    fn assign(&self, target: &Expression, value: Value, env: &Env) -> Flow<()> {
        match target {
            Expression::Identifier(name) => match env::assign(env, name, value) {
                Ok(()) => Ok(()),
                Err(_) => self.die(format!("assignment to undeclared variable `{}`", name)),
            },
            Expression::Index { left, index } => {
                let container = self.eval_expression(left, env)?.into_scalar();
                let index = self.eval_expression(index, env)?.into_scalar();
                self.store_into(&container, &index, value)
            }
            Expression::Member { object, name } => {
                let container = self.eval_expression(object, env)?.into_scalar();
                self.store_into(&container, &self.string(name.clone()), value)
            }
            other => self.die(format!("cannot assign to {}", other)),
        }
    }

    fn store_into(&self, container: &Value, index: &Value, value: Value) -> Flow<()> {
        match container {
            Value::Array(items) => {
                let len = items.borrow().len() as i64;
                let mut i = index.to_int();
                if i < 0 {
                    i += len;
                    if i < 0 {
                        return self.die("Modification of non-creatable array value attempted");
                    }
                }
                let old = {
                    let mut items = items.borrow_mut();
                    let i = i as usize;
                    if i >= items.len() {
                        items.resize(i + 1, Value::Undef);
                    }
                    std::mem::replace(&mut items[i], value)
                };
                drop(old);
                Ok(())
            }
            Value::Hash(table) => {
                let key = HashKey::from_value(index);
                let (existing, restricted) = {
                    let table = table.borrow();
                    (table.entries.get(&key).cloned(), table.proxy.is_some())
                };
                match (existing, restricted) {
                    (Some(Value::Field(stub)), _) => {
                        let Some(hooks) = &stub.link.hooks else {
                            return self.die("host object is detached");
                        };
                        let raw = self.store(value);
                        let outcome = hooks.set_field(stub.link.id, &stub.name, raw);
                        self.release(raw);
                        outcome.map_err(|err| self.hook_error(err))
                    }
                    (None, true) => self.die(format!(
                        "Attempt to access disallowed key '{}' in a restricted hash",
                        key.as_name()
                    )),
                    _ => {
                        let old = table.borrow_mut().entries.insert(key, value);
                        drop(old);
                        Ok(())
                    }
                }
            }
            other => self.die(format!("Can't assign into {}", other.type_name())),
        }
    }

    pub(crate) fn string(&self, text: impl Into<String>) -> Value {
        Value::Str(self.live.track(text.into()))
    }

    pub(crate) fn array(&self, items: Vec<Value>) -> Value {
        Value::Array(self.live.track(RefCell::new(items)))
    }

    pub(crate) fn hash(&self, table: HashTable) -> Value {
        Value::Hash(self.live.track(RefCell::new(table)))
    }

    pub(crate) fn complex(&self, re: f64, im: f64) -> Value {
        Value::Complex(self.live.track(ComplexParts { re, im }))
    }
}

impl Num {
    fn as_f64(&self) -> f64 {
        match self {
            Num::Int(v) => *v as f64,
            Num::Float(v) => *v,
        }
    }
}

fn to_num(value: &Value) -> Num {
    match value {
        Value::Int(v) => Num::Int(*v),
        Value::Uint(v) => match i64::try_from(*v) {
            Ok(v) => Num::Int(v),
            Err(_) => Num::Float(*v as f64),
        },
        Value::Float(v) => Num::Float(*v),
        Value::Bool(b) => Num::Int(i64::from(*b)),
        Value::Undef => Num::Int(0),
        Value::Str(s) => to_num(&numify(s)),
        other => Num::Float(other.to_float()),
    }
}

fn complex_parts(value: &Value) -> ComplexParts {
    match value {
        Value::Complex(c) => ***c,
        other => ComplexParts {
            re: other.to_float(),
            im: 0.0,
        },
    }
}

fn loose_eq(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Str(a), Value::Str(b)) => a.as_str() == b.as_str(),
        (Value::Str(_), other) | (other, Value::Str(_)) if other.is_number() => {
            left.to_float() == right.to_float()
        }
        _ => left.same(right),
    }
}

fn compare(operator: &str, left: &Value, right: &Value) -> bool {
    let ordering = match (left, right) {
        (Value::Str(a), Value::Str(b)) => a.as_str().partial_cmp(b.as_str()),
        _ => match (to_num(left), to_num(right)) {
            (Num::Int(a), Num::Int(b)) => a.partial_cmp(&b),
            (a, b) => a.as_f64().partial_cmp(&b.as_f64()),
        },
    };
    let Some(ordering) = ordering else {
        return false;
    };
    match operator {
        "<" => ordering.is_lt(),
        ">" => ordering.is_gt(),
        "<=" => ordering.is_le(),
        _ => ordering.is_ge(),
    }
}
