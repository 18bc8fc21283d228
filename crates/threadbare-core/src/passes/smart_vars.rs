use tracing::debug;

use crate::context::CompilationContext;
use crate::error::CoreError;
use crate::lower::ExprLowerer;

/// Resolve every queued smart variable to lowered text.
///
/// Each pass resolves the entries whose dependencies are all declared or
/// already resolved, including ones resolved earlier in the same pass. A
/// pass that resolves nothing means the remaining entries depend on each
/// other (or on undeclared names) and the compile fails.
pub fn resolve_smart_variables(ctx: &mut CompilationContext) -> Result<(), CoreError> {
    let mut pending: Vec<_> = std::mem::take(&mut ctx.unresolved).into_values().collect();
    let mut round = 0;
    while !pending.is_empty() {
        round += 1;
        let before = pending.len();
        let mut waiting = Vec::with_capacity(before);
        for smart in pending {
            let ready = smart
                .dependencies
                .iter()
                .all(|d| ctx.variables.contains_key(d) || ctx.resolved.contains_key(d));
            if ready {
                let text = ExprLowerer::new(ctx).lower(&smart.expression)?;
                debug!(variable = %smart.name, %text, round, "resolved smart variable");
                ctx.resolved.insert(smart.name, text);
            } else {
                waiting.push(smart);
            }
        }
        if waiting.len() == before {
            let names = waiting.iter().map(|s| s.name.clone()).collect();
            for smart in waiting {
                ctx.unresolved.insert(smart.name.clone(), smart);
            }
            return Err(CoreError::CyclicSmartVariables { names });
        }
        pending = waiting;
    }
    Ok(())
}
