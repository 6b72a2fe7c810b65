//! Scope-aware walk over a tree-sitter Python syntax tree.
//!
//! The walk visits a cell's statements in order. Module-scope assignments
//! become bindings; identifiers read before any such binding become uses.
//! Nested scopes keep their own locals and forward their free names outward
//! when they close.

use std::collections::BTreeSet;

use rustc_hash::FxHashSet;
use tree_sitter::Node;

use crate::syntax::node_text;

/// Names collected from one cell, before any policy is applied.
#[derive(Debug, Default)]
pub(crate) struct RawNames {
    pub bindings: BTreeSet<String>,
    pub uses: BTreeSet<String>,
    pub imports: BTreeSet<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScopeKind {
    Function,
    Lambda,
    Class,
    Comprehension,
}

#[derive(Debug)]
struct Scope {
    kind: ScopeKind,
    locals: FxHashSet<String>,
    /// Names declared `global` in this scope
    globals: FxHashSet<String>,
    /// Reads not yet matched against this scope's locals
    free: Vec<String>,
}

impl Scope {
    fn new(kind: ScopeKind) -> Self {
        Self {
            kind,
            locals: FxHashSet::default(),
            globals: FxHashSet::default(),
            free: Vec::new(),
        }
    }
}

pub(crate) struct NameCollector<'s> {
    source: &'s str,
    scopes: Vec<Scope>,
    /// Free names of function bodies, resolved once the whole cell is seen
    deferred: Vec<String>,
    names: RawNames,
}

fn named_children<'t>(node: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = node.walk();
    node.named_children(&mut cursor).collect()
}

/// Iterables of a `for_in_clause`.
fn iterables<'t>(clause: Node<'t>) -> Vec<Node<'t>> {
    let mut cursor = clause.walk();
    clause.children_by_field_name("right", &mut cursor).collect()
}

fn is_name(node: Node<'_>) -> bool {
    matches!(node.kind(), "identifier" | "keyword_identifier")
}

impl<'s> NameCollector<'s> {
    /// Collect bindings, uses and imports from a parsed module.
    pub(crate) fn collect(root: Node<'_>, source: &'s str) -> RawNames {
        let mut collector = Self {
            source,
            scopes: Vec::new(),
            deferred: Vec::new(),
            names: RawNames::default(),
        };
        collector.visit_children(root);
        collector.finish()
    }

    fn finish(mut self) -> RawNames {
        for name in std::mem::take(&mut self.deferred) {
            if !self.names.bindings.contains(&name) {
                self.names.uses.insert(name);
            }
        }
        self.names
    }

    fn text(&self, node: Node<'_>) -> String {
        node_text(node, self.source).to_string()
    }

    // -- name events --------------------------------------------------------

    fn read(&mut self, name: String) {
        match self.scopes.last_mut() {
            Some(scope) => scope.free.push(name),
            None => self.read_module(name),
        }
    }

    fn read_module(&mut self, name: String) {
        if !self.names.bindings.contains(&name) {
            self.names.uses.insert(name);
        }
    }

    fn bind(&mut self, name: String) {
        let depth = self.scopes.len().checked_sub(1);
        self.bind_at(depth, name);
    }

    /// Walrus targets inside comprehensions bind in the enclosing scope.
    fn bind_outside_comprehension(&mut self, name: String) {
        let depth = self
            .scopes
            .iter()
            .rposition(|scope| scope.kind != ScopeKind::Comprehension);
        self.bind_at(depth, name);
    }

    fn bind_at(&mut self, depth: Option<usize>, name: String) {
        match depth.map(|d| &mut self.scopes[d]) {
            Some(scope) if !scope.globals.contains(&name) => {
                scope.locals.insert(name);
            }
            _ => {
                self.names.bindings.insert(name);
            }
        }
    }

    fn bind_import(&mut self, name: String) {
        if self.scopes.is_empty() {
            self.names.imports.insert(name.clone());
        }
        self.bind(name);
    }

    fn push_scope(&mut self, kind: ScopeKind) {
        self.scopes.push(Scope::new(kind));
    }

    fn pop_scope(&mut self) {
        let Some(scope) = self.scopes.pop() else {
            return;
        };
        let runs_later = matches!(scope.kind, ScopeKind::Function | ScopeKind::Lambda);
        // Class bodies never enclose nested scopes.
        let target = self
            .scopes
            .iter()
            .rposition(|outer| outer.kind != ScopeKind::Class);

        for name in scope.free {
            if scope.locals.contains(&name) {
                continue;
            }
            match target {
                Some(depth) => self.scopes[depth].free.push(name),
                None if runs_later => self.deferred.push(name),
                None => self.read_module(name),
            }
        }
    }

    // -- traversal ----------------------------------------------------------

    fn visit_children(&mut self, node: Node<'_>) {
        for child in named_children(node) {
            self.visit(child);
        }
    }

    fn visit(&mut self, node: Node<'_>) {
        match node.kind() {
            "identifier" | "keyword_identifier" => self.read(self.text(node)),
            "comment" => {}
            "assignment" => self.visit_assignment(node),
            "augmented_assignment" => self.visit_augmented_assignment(node),
            "import_statement" | "import_from_statement" => self.visit_import(node),
            "future_import_statement" | "nonlocal_statement" => {}
            "global_statement" => self.visit_global(node),
            "function_definition" => self.visit_function(node),
            "class_definition" => self.visit_class(node),
            "lambda" => self.visit_lambda(node),
            "list_comprehension"
            | "set_comprehension"
            | "dictionary_comprehension"
            | "generator_expression" => self.visit_comprehension(node),
            "for_statement" => self.visit_for(node),
            "as_pattern" => self.visit_as_pattern(node),
            "case_pattern" => self.bind_case_pattern(node),
            "except_clause" => self.visit_except(node),
            "named_expression" => self.visit_named_expression(node),
            "keyword_argument" => {
                if let Some(value) = node.child_by_field_name("value") {
                    self.visit(value);
                }
            }
            "attribute" => {
                if let Some(object) = node.child_by_field_name("object") {
                    self.visit(object);
                }
            }
            "dotted_name" => {
                if let Some(first) = node.named_child(0) {
                    self.visit(first);
                }
            }
            _ => self.visit_children(node),
        }
    }

    fn visit_assignment(&mut self, node: Node<'_>) {
        if let Some(annotation) = node.child_by_field_name("type") {
            self.visit(annotation);
        }
        // The right-hand side runs first; a chained `a = b = 1` nests here.
        let right = node.child_by_field_name("right");
        if let Some(right) = right {
            self.visit(right);
        }
        match node.child_by_field_name("left") {
            Some(left) if right.is_some() => self.bind_target(left),
            // A bare annotation binds nothing; `obj.attr: T` still reads `obj`.
            Some(left) if !is_name(left) => self.visit(left),
            _ => {}
        }
    }

    fn visit_augmented_assignment(&mut self, node: Node<'_>) {
        if let Some(right) = node.child_by_field_name("right") {
            self.visit(right);
        }
        if let Some(left) = node.child_by_field_name("left") {
            if is_name(left) {
                let name = self.text(left);
                self.read(name.clone());
                self.bind(name);
            } else {
                self.visit(left);
            }
        }
    }

    /// Bind every name in an assignment target.
    fn bind_target(&mut self, node: Node<'_>) {
        match node.kind() {
            "identifier" | "keyword_identifier" => self.bind(self.text(node)),
            "pattern_list" | "tuple_pattern" | "list_pattern" | "tuple" | "list"
            | "expression_list" | "parenthesized_expression" | "list_splat_pattern"
            | "list_splat" | "as_pattern_target" => {
                for child in named_children(node) {
                    self.bind_target(child);
                }
            }
            // `obj.attr = v` and `obj[k] = v` read `obj`.
            _ => self.visit(node),
        }
    }

    fn visit_import(&mut self, node: Node<'_>) {
        let names: Vec<Node<'_>> = {
            let mut cursor = node.walk();
            node.children_by_field_name("name", &mut cursor).collect()
        };

        for imported in names {
            let bound = match imported.kind() {
                "aliased_import" => imported
                    .child_by_field_name("alias")
                    .map(|alias| self.text(alias)),
                // `import a.b.c` binds `a`
                "dotted_name" => imported.named_child(0).map(|first| self.text(first)),
                _ => None,
            };
            if let Some(name) = bound {
                self.bind_import(name);
            }
        }
    }

    fn visit_global(&mut self, node: Node<'_>) {
        let declared: Vec<String> = named_children(node)
            .into_iter()
            .filter(|child| is_name(*child))
            .map(|child| self.text(child))
            .collect();
        if let Some(scope) = self.scopes.last_mut() {
            scope.globals.extend(declared);
        }
    }

    fn visit_function(&mut self, node: Node<'_>) {
        // Defaults and annotations evaluate in the enclosing scope.
        let mut params = Vec::new();
        if let Some(parameters) = node.child_by_field_name("parameters") {
            self.visit_parameters(parameters, &mut params);
        }
        if let Some(return_type) = node.child_by_field_name("return_type") {
            self.visit(return_type);
        }
        if let Some(name) = node.child_by_field_name("name") {
            self.bind(self.text(name));
        }

        self.push_scope(ScopeKind::Function);
        for param in params {
            self.bind(param);
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.visit_children(body);
        }
        self.pop_scope();
    }

    fn visit_lambda(&mut self, node: Node<'_>) {
        let mut params = Vec::new();
        if let Some(parameters) = node.child_by_field_name("parameters") {
            self.visit_parameters(parameters, &mut params);
        }

        self.push_scope(ScopeKind::Lambda);
        for param in params {
            self.bind(param);
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.visit(body);
        }
        self.pop_scope();
    }

    fn visit_parameters(&mut self, parameters: Node<'_>, out: &mut Vec<String>) {
        for param in named_children(parameters) {
            match param.kind() {
                "default_parameter" | "typed_default_parameter" => {
                    if let Some(name) = param.child_by_field_name("name") {
                        self.parameter_names(name, out);
                    }
                    if let Some(annotation) = param.child_by_field_name("type") {
                        self.visit(annotation);
                    }
                    if let Some(value) = param.child_by_field_name("value") {
                        self.visit(value);
                    }
                }
                "typed_parameter" => {
                    if let Some(name) = param.named_child(0) {
                        self.parameter_names(name, out);
                    }
                    if let Some(annotation) = param.child_by_field_name("type") {
                        self.visit(annotation);
                    }
                }
                _ => self.parameter_names(param, out),
            }
        }
    }

    fn parameter_names(&self, node: Node<'_>, out: &mut Vec<String>) {
        match node.kind() {
            "identifier" | "keyword_identifier" => out.push(self.text(node)),
            "list_splat_pattern" | "dictionary_splat_pattern" | "tuple_pattern" => {
                for child in named_children(node) {
                    self.parameter_names(child, out);
                }
            }
            _ => {}
        }
    }

    fn visit_class(&mut self, node: Node<'_>) {
        if let Some(superclasses) = node.child_by_field_name("superclasses") {
            self.visit(superclasses);
        }
        if let Some(name) = node.child_by_field_name("name") {
            self.bind(self.text(name));
        }

        self.push_scope(ScopeKind::Class);
        if let Some(body) = node.child_by_field_name("body") {
            self.visit_children(body);
        }
        self.pop_scope();
    }

    fn visit_comprehension(&mut self, node: Node<'_>) {
        let clauses = named_children(node);

        // The outermost iterable is evaluated in the enclosing scope.
        let first = clauses
            .iter()
            .copied()
            .find(|clause| clause.kind() == "for_in_clause");
        if let Some(first) = first {
            for iterable in iterables(first) {
                self.visit(iterable);
            }
        }

        self.push_scope(ScopeKind::Comprehension);
        for clause in clauses {
            match clause.kind() {
                "for_in_clause" => {
                    if Some(clause) != first {
                        for iterable in iterables(clause) {
                            self.visit(iterable);
                        }
                    }
                    if let Some(left) = clause.child_by_field_name("left") {
                        self.bind_target(left);
                    }
                }
                "if_clause" => self.visit_children(clause),
                _ => {}
            }
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.visit(body);
        }
        self.pop_scope();
    }

    fn visit_for(&mut self, node: Node<'_>) {
        if let Some(right) = node.child_by_field_name("right") {
            self.visit(right);
        }
        if let Some(left) = node.child_by_field_name("left") {
            self.bind_target(left);
        }
        if let Some(body) = node.child_by_field_name("body") {
            self.visit_children(body);
        }
        if let Some(alternative) = node.child_by_field_name("alternative") {
            self.visit(alternative);
        }
    }

    /// `with open(p) as fh`, `except E as e` and `case … as x`.
    fn visit_as_pattern(&mut self, node: Node<'_>) {
        let alias = node.child_by_field_name("alias");
        for child in named_children(node) {
            if Some(child) == alias {
                self.bind_target(child);
            } else {
                self.visit(child);
            }
        }
    }

    /// Capture names in a `case` pattern bind; value patterns and class
    /// names are reads.
    fn bind_case_pattern(&mut self, node: Node<'_>) {
        match node.kind() {
            "identifier" | "keyword_identifier" | "as_pattern_target" => self.bind_target(node),
            "case_pattern" | "list_pattern" | "tuple_pattern" | "union_pattern" | "as_pattern"
            | "splat_pattern" => {
                for child in named_children(node) {
                    self.bind_case_pattern(child);
                }
            }
            // `Point.ORIGIN` compares against a value; a single name captures.
            "dotted_name" => {
                if node.named_child_count() == 1 {
                    if let Some(name) = node.named_child(0) {
                        self.bind(self.text(name));
                    }
                } else {
                    self.visit(node);
                }
            }
            "class_pattern" => {
                for (position, child) in named_children(node).into_iter().enumerate() {
                    if position == 0 {
                        self.visit(child);
                    } else {
                        self.bind_case_pattern(child);
                    }
                }
            }
            // `x=pattern`: the keyword names an attribute.
            "keyword_pattern" => {
                for child in named_children(node).into_iter().skip(1) {
                    self.bind_case_pattern(child);
                }
            }
            "dict_pattern" => {
                let keys: Vec<Node<'_>> = {
                    let mut cursor = node.walk();
                    node.children_by_field_name("key", &mut cursor).collect()
                };
                for child in named_children(node) {
                    if keys.contains(&child) {
                        self.visit(child);
                    } else {
                        self.bind_case_pattern(child);
                    }
                }
            }
            _ => self.visit(node),
        }
    }

    fn visit_except(&mut self, node: Node<'_>) {
        let children: Vec<Node<'_>> = {
            let mut cursor = node.walk();
            node.children(&mut cursor).collect()
        };

        let mut after_as = false;
        for child in children {
            if !child.is_named() {
                after_as = child.kind() == "as";
                continue;
            }
            if after_as && is_name(child) {
                self.bind(self.text(child));
            } else {
                self.visit(child);
            }
            after_as = false;
        }
    }

    fn visit_named_expression(&mut self, node: Node<'_>) {
        if let Some(value) = node.child_by_field_name("value") {
            self.visit(value);
        }
        if let Some(name) = node.child_by_field_name("name") {
            self.bind_outside_comprehension(self.text(name));
        }
    }
}
