//! Compiled symbolic functions.
//!
//! A [`Function`] maps a list of symbolic input vectors to a list of output
//! expression vectors. It can be
//!
//! - evaluated numerically ([`Function::eval`]),
//! - called symbolically from another graph ([`Function::call`]), which
//!   creates call nodes instead of copying the callee's graph,
//! - expanded ([`Function::expand`]), which inlines every nested call so the
//!   result is a flat graph of scalar operations,
//! - differentiated ([`Function::jacobian`]).

use std::fmt;
use std::sync::Arc;

use hashbrown::HashMap;
use nalgebra::DVector;
use tracing::debug;

use crate::error::{Result, SymbolicError};
use crate::expr::{next_id, CallSite, Expr};
use crate::vector::SymVector;

#[derive(Debug)]
struct FunctionInner {
    id: u64,
    name: String,
    input_names: Vec<String>,
    inputs: Vec<SymVector>,
    output_names: Vec<String>,
    outputs: Vec<SymVector>,
}

/// A compiled mapping from symbolic inputs to symbolic outputs.
///
/// Cheap to clone; clones share the same graph.
#[derive(Clone)]
pub struct Function(Arc<FunctionInner>);

impl Function {
    /// Compile a function.
    ///
    /// Every input element must be a bare symbol, no symbol may appear twice
    /// across the inputs, and the outputs may only depend on input symbols.
    pub fn new<I, O, SI, SO>(name: impl Into<String>, inputs: I, outputs: O) -> Result<Self>
    where
        I: IntoIterator<Item = (SI, SymVector)>,
        O: IntoIterator<Item = (SO, SymVector)>,
        SI: Into<String>,
        SO: Into<String>,
    {
        let name = name.into();
        let (input_names, inputs): (Vec<String>, Vec<SymVector>) =
            inputs.into_iter().map(|(n, v)| (n.into(), v)).unzip();
        let (output_names, outputs): (Vec<String>, Vec<SymVector>) =
            outputs.into_iter().map(|(n, v)| (n.into(), v)).unzip();

        let mut declared: HashMap<u64, ()> = HashMap::new();
        for (input, vector) in inputs.iter().enumerate() {
            for (index, e) in vector.iter().enumerate() {
                let symbol = e.as_symbol().ok_or_else(|| SymbolicError::InputNotSymbolic {
                    function: name.clone(),
                    input,
                    index,
                })?;
                if declared.insert(symbol.id(), ()).is_some() {
                    return Err(SymbolicError::DuplicateSymbol {
                        function: name,
                        name: symbol.name().to_string(),
                    });
                }
            }
        }

        let mut visited = HashMap::new();
        let mut free = Vec::new();
        for e in outputs.iter().flat_map(SymVector::iter) {
            e.collect_symbols(&mut visited, &mut free);
        }
        if let Some(symbol) = free.iter().find(|s| !declared.contains_key(&s.id())) {
            return Err(SymbolicError::FreeSymbol {
                function: name,
                name: symbol.name().to_string(),
            });
        }

        Ok(Self(Arc::new(FunctionInner {
            id: next_id(),
            name,
            input_names,
            inputs,
            output_names,
            outputs,
        })))
    }

    /// Function name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    /// Number of inputs.
    #[must_use]
    pub fn n_in(&self) -> usize {
        self.0.inputs.len()
    }

    /// Number of outputs.
    #[must_use]
    pub fn n_out(&self) -> usize {
        self.0.outputs.len()
    }

    /// Length of input `i` (0 if out of range).
    #[must_use]
    pub fn size_in(&self, i: usize) -> usize {
        self.0.inputs.get(i).map_or(0, SymVector::len)
    }

    /// Length of output `i` (0 if out of range).
    #[must_use]
    pub fn size_out(&self, i: usize) -> usize {
        self.0.outputs.get(i).map_or(0, SymVector::len)
    }

    /// Name of input `i`.
    #[must_use]
    pub fn name_in(&self, i: usize) -> Option<&str> {
        self.0.input_names.get(i).map(String::as_str)
    }

    /// Name of output `i`.
    #[must_use]
    pub fn name_out(&self, i: usize) -> Option<&str> {
        self.0.output_names.get(i).map(String::as_str)
    }

    /// The symbolic inputs.
    #[must_use]
    pub fn inputs(&self) -> &[SymVector] {
        &self.0.inputs
    }

    /// The symbolic outputs.
    #[must_use]
    pub fn outputs(&self) -> &[SymVector] {
        &self.0.outputs
    }

    /// Check if the graph is flat (contains no nested calls).
    #[must_use]
    pub fn is_expanded(&self) -> bool {
        !self
            .0
            .outputs
            .iter()
            .flat_map(SymVector::iter)
            .any(Expr::has_calls)
    }

    fn check_arity(&self, actual: usize) -> Result<()> {
        if actual != self.n_in() {
            return Err(SymbolicError::ArgumentCount {
                function: self.0.name.clone(),
                expected: self.n_in(),
                actual,
            });
        }
        Ok(())
    }

    fn check_shape(&self, input: usize, actual: usize) -> Result<()> {
        let expected = self.size_in(input);
        if actual != expected {
            return Err(SymbolicError::ArgumentShape {
                function: self.0.name.clone(),
                input,
                expected,
                actual,
            });
        }
        Ok(())
    }

    /// Evaluate numerically.
    pub fn eval(&self, args: &[DVector<f64>]) -> Result<Vec<DVector<f64>>> {
        self.check_arity(args.len())?;
        let mut env = HashMap::new();
        for (i, (input, arg)) in self.0.inputs.iter().zip(args).enumerate() {
            self.check_shape(i, arg.len())?;
            for (e, v) in input.iter().zip(arg.iter()) {
                if let Some(s) = e.as_symbol() {
                    env.insert(s.id(), *v);
                }
            }
        }

        let mut cache = HashMap::new();
        let mut calls = HashMap::new();
        self.0
            .outputs
            .iter()
            .map(|out| {
                let values = out
                    .iter()
                    .map(|e| e.evaluate(&env, &mut cache, &mut calls))
                    .collect::<Result<Vec<f64>>>()?;
                Ok(DVector::from_vec(values))
            })
            .collect()
    }

    /// Call symbolically. Each output element becomes a call node that
    /// refers to this function, so the callee's graph is not copied.
    pub fn call(&self, args: &[SymVector]) -> Result<Vec<SymVector>> {
        self.check_arity(args.len())?;
        for (i, arg) in args.iter().enumerate() {
            self.check_shape(i, arg.len())?;
        }
        let site = Arc::new(CallSite {
            function: self.clone(),
            args: args.to_vec(),
        });
        Ok((0..self.n_out())
            .map(|output| {
                (0..self.size_out(output))
                    .map(|index| Expr::call(Arc::clone(&site), output, index))
                    .collect()
            })
            .collect())
    }

    /// Outputs with every call inlined and the inputs replaced by `args`.
    pub(crate) fn inline_outputs(&self, args: &[SymVector]) -> Vec<SymVector> {
        let flat = self.expand();
        let mut map = HashMap::new();
        for (input, arg) in flat.0.inputs.iter().zip(args) {
            for (e, value) in input.iter().zip(arg.iter()) {
                if let Some(s) = e.as_symbol() {
                    map.insert(s.id(), value.clone());
                }
            }
        }
        let mut cache = HashMap::new();
        flat.0
            .outputs
            .iter()
            .map(|out| out.map(|e| e.substitute(&map, &mut cache)))
            .collect()
    }

    /// Inline every nested call, producing a flat graph with the same
    /// inputs, outputs and numeric behavior.
    #[must_use]
    pub fn expand(&self) -> Self {
        if self.is_expanded() {
            return self.clone();
        }
        let mut cache = HashMap::new();
        let mut sites = HashMap::new();
        let outputs: Vec<SymVector> = self
            .0
            .outputs
            .iter()
            .map(|out| out.map(|e| e.inline(&mut cache, &mut sites)))
            .collect();
        debug!(
            function = %self.0.name,
            inlined_calls = sites.len(),
            "expanded function graph"
        );
        Self(Arc::new(FunctionInner {
            id: next_id(),
            name: self.0.name.clone(),
            input_names: self.0.input_names.clone(),
            inputs: self.0.inputs.clone(),
            output_names: self.0.output_names.clone(),
            outputs,
        }))
    }

    /// Jacobian of output `output` with respect to input `input`.
    ///
    /// The result has the same inputs and a single output `jac` holding the
    /// `size_out(output) x size_in(input)` matrix in row-major order.
    pub fn jacobian(&self, input: usize, output: usize) -> Result<Self> {
        let flat = self.expand();
        let wrt = flat
            .0
            .inputs
            .get(input)
            .and_then(SymVector::symbols)
            .ok_or(SymbolicError::OutOfRange {
                index: input,
                len: self.n_in(),
            })?;
        let out = flat.0.outputs.get(output).ok_or(SymbolicError::OutOfRange {
            index: output,
            len: self.n_out(),
        })?;

        let mut jac = SymVector::new();
        for e in out.iter() {
            for s in &wrt {
                jac.push(e.diff(s)?);
            }
        }

        let name = format!("jac_{}", self.0.name);
        Self::new(
            name,
            flat.0
                .input_names
                .iter()
                .cloned()
                .zip(flat.0.inputs.iter().cloned()),
            [("jac", jac)],
        )
    }

    /// Check if `self` and `other` are the same compiled function.
    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        self.0.id == other.0.id
    }
}

impl fmt::Debug for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Function")
            .field("name", &self.0.name)
            .field("inputs", &self.0.input_names)
            .field("sizes_in", &self.0.inputs.iter().map(SymVector::len).collect::<Vec<_>>())
            .field("outputs", &self.0.output_names)
            .field(
                "sizes_out",
                &self.0.outputs.iter().map(SymVector::len).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sig = |names: &[String], vecs: &[SymVector]| {
            names
                .iter()
                .zip(vecs)
                .map(|(n, v)| format!("{n}[{}]", v.len()))
                .collect::<Vec<_>>()
                .join(",")
        };
        write!(
            f,
            "{}:({})->({})",
            self.0.name,
            sig(&self.0.input_names, &self.0.inputs),
            sig(&self.0.output_names, &self.0.outputs)
        )
    }
}
