//! Per-function control-flow graph construction (spec.md §4.4).
//!
//! A block's `rpo_order` is cached and invalidated via a generation counter
//! rather than trusting callers to recompute it after every mutation — the
//! same defensive-cache idiom the teacher's `call_graph.rs` uses for its
//! SCC decomposition, applied here to reverse post-order instead.

use std::cell::RefCell;
use std::collections::HashMap;

use crate::ast::{Declaration, Program, Statement};
use crate::diagnostics::{Diagnostic, DiagnosticBag};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BlockId(pub usize);

#[derive(Debug, Clone)]
pub struct BasicBlock {
    pub id: BlockId,
    /// Leaf (non-control-flow) statements in this block, in order.
    pub statements: Vec<Statement>,
    pub predecessors: Vec<BlockId>,
    pub successors: Vec<BlockId>,
    pub contains_call: bool,
}

impl BasicBlock {
    fn new(id: BlockId) -> Self {
        BasicBlock {
            id,
            statements: Vec::new(),
            predecessors: Vec::new(),
            successors: Vec::new(),
            contains_call: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ControlFlowGraph {
    pub function_name: String,
    pub entry_block_id: BlockId,
    blocks: HashMap<BlockId, BasicBlock>,
    generation: u64,
    rpo_cache: RefCell<Option<(u64, Vec<BlockId>)>>,
}

impl ControlFlowGraph {
    fn new(function_name: String, entry_block_id: BlockId) -> Self {
        ControlFlowGraph {
            function_name,
            entry_block_id,
            blocks: HashMap::new(),
            generation: 0,
            rpo_cache: RefCell::new(None),
        }
    }

    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(&id)
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        self.blocks.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    fn insert(&mut self, block: BasicBlock) {
        self.blocks.insert(block.id, block);
        self.generation += 1;
    }

    fn add_edge(&mut self, from: BlockId, to: BlockId) {
        if let Some(b) = self.blocks.get_mut(&from) {
            if !b.successors.contains(&to) {
                b.successors.push(to);
            }
        }
        if let Some(b) = self.blocks.get_mut(&to) {
            if !b.predecessors.contains(&from) {
                b.predecessors.push(from);
            }
        }
        self.generation += 1;
    }

    /// Reverse post-order from the entry block, lazily recomputed whenever
    /// the block map has changed since the cache was filled.
    pub fn rpo_order(&self) -> Vec<BlockId> {
        if let Some((gen, order)) = self.rpo_cache.borrow().as_ref() {
            if *gen == self.generation {
                return order.clone();
            }
        }
        let order = self.compute_rpo();
        *self.rpo_cache.borrow_mut() = Some((self.generation, order.clone()));
        order
    }

    fn compute_rpo(&self) -> Vec<BlockId> {
        let mut visited = std::collections::HashSet::new();
        let mut post_order = Vec::new();
        self.dfs_post_order(self.entry_block_id, &mut visited, &mut post_order);
        post_order.reverse();
        post_order
    }

    fn dfs_post_order(
        &self,
        id: BlockId,
        visited: &mut std::collections::HashSet<BlockId>,
        post_order: &mut Vec<BlockId>,
    ) {
        if !visited.insert(id) {
            return;
        }
        if let Some(block) = self.blocks.get(&id) {
            for &succ in &block.successors {
                self.dfs_post_order(succ, visited, post_order);
            }
        }
        post_order.push(id);
    }

    /// Reachable blocks with no successor — the set of paths that fall off
    /// the end of the body. Unreachable bookkeeping blocks (created after a
    /// terminator with nothing left to wire to) are excluded via the
    /// reachable-from-entry `rpo_order`, used by the
    /// VALOF-must-reach-RESULTIS check.
    fn dead_end_blocks(&self) -> Vec<BlockId> {
        self.rpo_order()
            .into_iter()
            .filter(|id| self.blocks.get(id).is_some_and(|b| b.successors.is_empty()))
            .collect()
    }
}

/// Builds one `ControlFlowGraph` per function/routine/method body, walking
/// the statement tree per the rules in spec.md §4.4.
struct CfgBuilder {
    cfg: ControlFlowGraph,
    next_id: usize,
    current: BlockId,
    /// Label name -> block id, resolved as labels are encountered; a
    /// forward `GOTO` records a pending edge resolved once the label's
    /// block exists.
    labels: HashMap<String, BlockId>,
    pending_gotos: Vec<(BlockId, String)>,
    /// Whether any path through the body so far has reached a `RESULTIS`,
    /// for the VALOF coverage check.
    saw_resultis: bool,
}

impl CfgBuilder {
    fn new(function_name: &str) -> Self {
        let entry = BlockId(0);
        let mut cfg = ControlFlowGraph::new(function_name.to_string(), entry);
        cfg.insert(BasicBlock::new(entry));
        CfgBuilder {
            cfg,
            next_id: 1,
            current: entry,
            labels: HashMap::new(),
            pending_gotos: Vec::new(),
            saw_resultis: false,
        }
    }

    fn fresh_block(&mut self) -> BlockId {
        let id = BlockId(self.next_id);
        self.next_id += 1;
        self.cfg.insert(BasicBlock::new(id));
        id
    }

    fn push_statement(&mut self, stmt: Statement) {
        let current = self.current;
        self.push_statement_to(current, stmt);
    }

    /// Pushes `stmt` into an arbitrary block rather than `self.current` —
    /// needed for a loop header or switch dispatch block, which is never
    /// itself `current` when its condition/selector expression is known.
    fn push_statement_to(&mut self, block_id: BlockId, stmt: Statement) {
        let is_call = statement_contains_call(&stmt);
        if let Some(block) = self.cfg.blocks.get_mut(&block_id) {
            block.statements.push(stmt);
            if is_call {
                block.contains_call = true;
            }
        }
    }

    fn switch_to(&mut self, id: BlockId) {
        self.current = id;
    }

    fn build(mut self, body: &Statement) -> ControlFlowGraph {
        self.walk(body);
        for (from, label) in std::mem::take(&mut self.pending_gotos) {
            if let Some(&target) = self.labels.get(&label) {
                self.cfg.add_edge(from, target);
            }
        }
        self.cfg
    }

    /// `WHILE`/`UNTIL` share the header-branches-to-body-or-exit shape
    /// (spec.md §4.4); only the condition's truth sense differs, which the
    /// CFG itself does not need to distinguish. The condition is re-checked
    /// at `header` every iteration, so its use is recorded there.
    fn walk_header_loop(&mut self, condition: &crate::ast::Expression, body: &Statement) {
        let header = self.fresh_block();
        let body_block = self.fresh_block();
        let exit_block = self.fresh_block();
        self.push_statement_to(header, Statement::Evaluate(condition.clone()));
        self.cfg.add_edge(self.current, header);
        self.cfg.add_edge(header, body_block);
        self.cfg.add_edge(header, exit_block);
        self.switch_to(body_block);
        self.walk(body);
        self.cfg.add_edge(self.current, header);
        self.switch_to(exit_block);
    }

    fn walk(&mut self, stmt: &Statement) {
        match stmt {
            Statement::If(s) => {
                let then_block = self.fresh_block();
                let join_block = self.fresh_block();
                self.push_statement(Statement::Evaluate(s.condition.clone()));
                self.cfg.add_edge(self.current, then_block);
                self.cfg.add_edge(self.current, join_block);
                self.switch_to(then_block);
                self.walk(&s.then_branch);
                self.cfg.add_edge(self.current, join_block);
                self.switch_to(join_block);
            }
            Statement::Unless(s) => {
                let then_block = self.fresh_block();
                let join_block = self.fresh_block();
                self.push_statement(Statement::Evaluate(s.condition.clone()));
                self.cfg.add_edge(self.current, join_block);
                self.cfg.add_edge(self.current, then_block);
                self.switch_to(then_block);
                self.walk(&s.then_branch);
                self.cfg.add_edge(self.current, join_block);
                self.switch_to(join_block);
            }
            Statement::Test(s) => {
                let then_block = self.fresh_block();
                let else_block = self.fresh_block();
                let join_block = self.fresh_block();
                self.push_statement(Statement::Evaluate(s.condition.clone()));
                self.cfg.add_edge(self.current, then_block);
                self.cfg.add_edge(self.current, else_block);
                self.switch_to(then_block);
                self.walk(&s.then_branch);
                self.cfg.add_edge(self.current, join_block);
                self.switch_to(else_block);
                self.walk(&s.else_branch);
                self.cfg.add_edge(self.current, join_block);
                self.switch_to(join_block);
            }
            Statement::While(s) => self.walk_header_loop(&s.condition, &s.body),
            Statement::Until(s) => self.walk_header_loop(&s.condition, &s.body),
            Statement::Repeat(s) => {
                let body_block = self.fresh_block();
                let exit_block = self.fresh_block();
                self.cfg.add_edge(self.current, body_block);
                self.switch_to(body_block);
                self.walk(&s.body);
                if let Some(condition) = &s.condition {
                    self.push_statement(Statement::Evaluate(condition.clone()));
                }
                self.cfg.add_edge(self.current, body_block);
                self.cfg.add_edge(self.current, exit_block);
                self.switch_to(exit_block);
            }
            Statement::For(s) => {
                let header = self.fresh_block();
                let body_block = self.fresh_block();
                let exit_block = self.fresh_block();
                self.push_statement(Statement::Assignment(crate::ast::Assignment {
                    lhs: vec![crate::ast::Expression::VariableAccess {
                        id: crate::ast::NodeId(u32::MAX),
                        name: s.var_name.clone(),
                        location: crate::ast::SourceLocation::new(0, 0),
                    }],
                    rhs: vec![s.from.clone()],
                    location: crate::ast::SourceLocation::new(0, 0),
                }));
                self.push_statement_to(header, Statement::Evaluate(s.to.clone()));
                if let Some(by) = &s.by {
                    self.push_statement_to(header, Statement::Evaluate(by.clone()));
                }
                self.cfg.add_edge(self.current, header);
                self.cfg.add_edge(header, body_block);
                self.cfg.add_edge(header, exit_block);
                self.switch_to(body_block);
                self.walk(&s.body);
                self.cfg.add_edge(self.current, header);
                self.switch_to(exit_block);
            }
            Statement::ForEach(s) => {
                let header = self.fresh_block();
                let body_block = self.fresh_block();
                let exit_block = self.fresh_block();
                self.push_statement_to(header, Statement::Evaluate(s.collection.clone()));
                self.cfg.add_edge(self.current, header);
                self.cfg.add_edge(header, body_block);
                self.cfg.add_edge(header, exit_block);
                self.switch_to(body_block);
                self.walk(&s.body);
                self.cfg.add_edge(self.current, header);
                self.switch_to(exit_block);
            }
            Statement::Switchon(s) => {
                let join_block = self.fresh_block();
                self.push_statement(Statement::Evaluate(s.selector.clone()));
                for case in &s.cases {
                    let case_block = self.fresh_block();
                    self.cfg.add_edge(self.current, case_block);
                    let saved = self.current;
                    self.switch_to(case_block);
                    self.walk(&case.body);
                    self.cfg.add_edge(self.current, join_block);
                    self.switch_to(saved);
                }
                if let Some(default) = &s.default {
                    let default_block = self.fresh_block();
                    self.cfg.add_edge(self.current, default_block);
                    self.switch_to(default_block);
                    self.walk(default);
                    self.cfg.add_edge(self.current, join_block);
                } else {
                    self.cfg.add_edge(self.current, join_block);
                }
                self.switch_to(join_block);
            }
            Statement::Goto(crate::ast::Expression::VariableAccess { name, .. }) => {
                self.pending_gotos.push((self.current, name.clone()));
                let unreachable = self.fresh_block();
                self.switch_to(unreachable);
            }
            Statement::Goto(_) => {
                let unreachable = self.fresh_block();
                self.switch_to(unreachable);
            }
            Statement::Return | Statement::Finish | Statement::Break | Statement::Loop
            | Statement::Endcase => {
                let unreachable = self.fresh_block();
                self.switch_to(unreachable);
            }
            Statement::Resultis(_) => {
                self.saw_resultis = true;
                self.push_statement(stmt.clone());
                let unreachable = self.fresh_block();
                self.switch_to(unreachable);
            }
            Statement::Defer(inner) => self.walk(inner),
            Statement::LabelTarget(name) => {
                let label_block = self.fresh_block();
                self.cfg.add_edge(self.current, label_block);
                self.labels.insert(name.clone(), label_block);
                self.switch_to(label_block);
            }
            Statement::Block(b) => {
                // `b.declarations` carries only bare (initializer-less)
                // LET declarations — the block-scoped LET lowering in the
                // parser already emits the initializer as an `Assignment`
                // in `b.statements`, walked below.
                for s in &b.statements {
                    self.walk(s);
                }
            }
            Statement::Compound(c) => {
                for s in &c.statements {
                    self.walk(s);
                }
            }
            Statement::Assignment(_)
            | Statement::RoutineCall(_)
            | Statement::Retain(_)
            | Statement::Remanage(_)
            | Statement::Free(_)
            | Statement::Brk => {
                self.push_statement(stmt.clone());
            }
            // Only ever synthesized by this builder via `push_statement`/
            // `push_statement_to`, never reached through recursive `walk`.
            Statement::Evaluate(_) => unreachable!("Evaluate is never walked, only pushed"),
        }
    }
}

fn statement_contains_call(stmt: &Statement) -> bool {
    match stmt {
        Statement::RoutineCall(e) => expression_contains_call(e),
        Statement::Assignment(a) => {
            a.rhs.iter().any(expression_contains_call) || a.lhs.iter().any(expression_contains_call)
        }
        Statement::Resultis(e) | Statement::Free(e) | Statement::Goto(e) | Statement::Evaluate(e) => {
            expression_contains_call(e)
        }
        _ => false,
    }
}

fn expression_contains_call(expr: &crate::ast::Expression) -> bool {
    use crate::ast::Expression::*;
    match expr {
        FunctionCall { .. } => true,
        BinaryOp { lhs, rhs, .. } => expression_contains_call(lhs) || expression_contains_call(rhs),
        UnaryOp { operand, .. } => expression_contains_call(operand),
        VectorAccess { base, index, .. } | CharIndirection { base, index, .. } => {
            expression_contains_call(base) || index.as_deref().is_some_and(expression_contains_call)
        }
        Bitfield { base, offset, width, .. } => {
            expression_contains_call(base)
                || expression_contains_call(offset)
                || expression_contains_call(width)
        }
        ConditionalExpression { condition, then_value, else_value, .. } => {
            expression_contains_call(condition)
                || expression_contains_call(then_value)
                || expression_contains_call(else_value)
        }
        MemberAccessExpression { object, .. } => expression_contains_call(object),
        SuperMethodAccessExpression { args, .. } | NewExpression { args, .. } => {
            args.iter().any(expression_contains_call)
        }
        VecAllocation { size, .. } => expression_contains_call(size),
        TableExpression { entries, .. } | ListExpression { entries, .. } => {
            entries.iter().any(expression_contains_call)
        }
        _ => false,
    }
}

pub struct CfgConstruction;

impl CfgConstruction {
    /// Builds a CFG for every function, routine, and method body in the
    /// program. VALOF/FVALOF bodies are additionally checked for full
    /// RESULTIS coverage (spec.md §9, Open Question 2).
    pub fn run(program: &Program) -> (HashMap<String, ControlFlowGraph>, DiagnosticBag) {
        let mut graphs = HashMap::new();
        let mut diagnostics = DiagnosticBag::new();
        for decl in &program.declarations {
            match decl {
                Declaration::Routine(r) => {
                    let cfg = CfgBuilder::new(&r.name).build(&r.body);
                    graphs.insert(r.name.clone(), cfg);
                }
                Declaration::Function(f) => {
                    Self::build_valof_bearing(&f.name, &f.body, &mut graphs, &mut diagnostics, f.location);
                }
                Declaration::Class(c) => {
                    for member in &c.members {
                        let crate::ast::ClassMember::Method(m) = member else { continue };
                        let owner = format!("{}::{}", c.name, m.name());
                        if let Some(func) = &m.function {
                            Self::build_valof_bearing(&owner, &func.body, &mut graphs, &mut diagnostics, func.location);
                        }
                        if let Some(r) = &m.routine {
                            let cfg = CfgBuilder::new(&owner).build(&r.body);
                            graphs.insert(owner, cfg);
                        }
                    }
                }
                _ => {}
            }
        }
        (graphs, diagnostics)
    }

    fn build_valof_bearing(
        name: &str,
        body: &crate::ast::Expression,
        graphs: &mut HashMap<String, ControlFlowGraph>,
        diagnostics: &mut DiagnosticBag,
        location: crate::ast::SourceLocation,
    ) {
        let stmt = match body {
            crate::ast::Expression::ValofExpression { body, .. }
            | crate::ast::Expression::FloatValofExpression { body, .. } => Some(body.as_ref()),
            _ => None,
        };
        let Some(stmt) = stmt else {
            return;
        };
        let mut builder = CfgBuilder::new(name);
        builder.walk(stmt);
        let saw_resultis = builder.saw_resultis;
        for (from, label) in std::mem::take(&mut builder.pending_gotos) {
            if let Some(&target) = builder.labels.get(&label) {
                builder.cfg.add_edge(from, target);
            }
        }
        let cfg = builder.cfg;
        if !saw_resultis {
            diagnostics.push(Diagnostic::semantic(
                format!("VALOF body of '{name}' has no path that reaches RESULTIS"),
                location.line,
                location.column,
            ));
        } else {
            // Every dead-end block (no successors, i.e. a path that falls
            // off the end of the body) must itself end in RESULTIS.
            let uncovered = cfg.dead_end_blocks().into_iter().any(|id| {
                cfg.block(id)
                    .is_some_and(|b| !matches!(b.statements.last(), Some(Statement::Resultis(_))))
            });
            if uncovered {
                diagnostics.push(Diagnostic::semantic(
                    format!("VALOF body of '{name}' may fall off the end without RESULTIS"),
                    location.line,
                    location.column,
                ));
            }
        }
        graphs.insert(name.to_string(), cfg);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::Parser;

    fn build(src: &str) -> (HashMap<String, ControlFlowGraph>, DiagnosticBag) {
        let (program, parse_diag) = Parser::new(src).parse();
        assert!(parse_diag.is_empty(), "{:?}", parse_diag.into_vec());
        CfgConstruction::run(&program)
    }

    #[test]
    fn routine_with_no_branches_has_one_block() {
        let (graphs, _) = build("LET f() BE $( LET x = 1 $)");
        let cfg = graphs.get("f").unwrap();
        assert_eq!(cfg.len(), 1);
    }

    #[test]
    fn test_statement_has_two_successor_paths() {
        let src = "LET f() BE TEST 1 = 1 THEN $( RETURN $) ELSE $( RETURN $)";
        let (graphs, _) = build(src);
        let cfg = graphs.get("f").unwrap();
        let entry = cfg.block(cfg.entry_block_id).unwrap();
        assert_eq!(entry.successors.len(), 2);
    }

    #[test]
    fn rpo_order_includes_every_block() {
        let src = "LET f() BE WHILE 1 DO $( RETURN $)";
        let (graphs, _) = build(src);
        let cfg = graphs.get("f").unwrap();
        let order = cfg.rpo_order();
        assert_eq!(order.len(), cfg.len());
    }

    #[test]
    fn valof_without_resultis_is_flagged() {
        let (_, diagnostics) = build("LET f() = VALOF $( LET x = 1 $)");
        assert!(diagnostics.is_fatal());
    }

    #[test]
    fn valof_with_resultis_on_every_path_is_accepted() {
        let (_, diagnostics) = build("LET f() = VALOF $( RESULTIS 1 $)");
        assert!(diagnostics.is_empty());
    }

    #[test]
    fn call_in_block_sets_contains_call() {
        let (graphs, _) = build("LET g() = 1 \n LET f() BE $( LET x = g() $)");
        let cfg = graphs.get("f").unwrap();
        let entry = cfg.block(cfg.entry_block_id).unwrap();
        assert!(entry.contains_call);
    }

    #[test]
    fn call_in_if_condition_sets_contains_call() {
        let (graphs, _) = build("LET g() = 1 \n LET f() BE IF g() = 1 THEN $( RETURN $)");
        let cfg = graphs.get("f").unwrap();
        let entry = cfg.block(cfg.entry_block_id).unwrap();
        assert!(entry.contains_call);
    }

    #[test]
    fn while_condition_is_recorded_as_a_statement_in_the_header() {
        let src = "LET f() BE WHILE n > 0 DO $( RETURN $)";
        let (graphs, _) = build(src);
        let cfg = graphs.get("f").unwrap();
        let header = cfg
            .block(cfg.entry_block_id)
            .unwrap()
            .successors
            .first()
            .copied()
            .unwrap();
        let header_block = cfg.block(header).unwrap();
        assert!(matches!(
            header_block.statements.first(),
            Some(Statement::Evaluate(_))
        ));
    }

    #[test]
    fn switchon_selector_sets_contains_call() {
        let (graphs, _) = build("LET g() = 1 \n LET f() BE SWITCHON g() INTO { CASE 1: RETURN }");
        let cfg = graphs.get("f").unwrap();
        let entry = cfg.block(cfg.entry_block_id).unwrap();
        assert!(entry.contains_call);
    }
}
