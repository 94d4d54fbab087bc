use crate::primitives::{
    BlockEnv,
    Journal,
    SpecId,
    TxEnv,
};

use alloy_evm::{
    EvmEnv,
    eth::EthEvmContext,
};

use revm::{
    Context,
    Database,
    Inspector,
    MainnetEvm,
    context::{
        CfgEnv,
        Evm,
        JournalTr,
        LocalContext,
    },
    handler::{
        EthFrame,
        EthPrecompiles,
        instructions::EthInstructions,
    },
    interpreter::interpreter::EthInterpreter,
    precompile::{
        PrecompileSpecId,
        Precompiles,
    },
};

/// Builds an EVM environment for the sandbox chain.
/// The `chain_id` and `spec_id` configure the chain rules, the `block_env`
/// the block the transaction executes in.
pub fn evm_env(chain_id: u64, spec_id: SpecId, block_env: BlockEnv) -> EvmEnv {
    let mut cfg_env = CfgEnv::default();

    cfg_env.chain_id = chain_id;
    cfg_env.spec = spec_id;
    // Development accounts may carry code, and deployed artifacts are not
    // size-capped in the sandbox.
    cfg_env.disable_eip3607 = true;
    cfg_env.limit_contract_code_size = Some(usize::MAX);

    EvmEnv { cfg_env, block_env }
}

pub type EthCtx<'db, DB> =
    Context<BlockEnv, TxEnv, CfgEnv<SpecId>, &'db mut DB, Journal<&'db mut DB>, ()>;
pub type EthIns<'db, DB> = EthInstructions<EthInterpreter, EthCtx<'db, DB>>;
pub type EthEvm<'db, DB, I> = Evm<EthCtx<'db, DB>, I, EthIns<'db, DB>, EthPrecompiles, EthFrame>;

/// Builds a mainnet Ethereum EVM over the given database.
/// Passes the `db` as a mutable reference so committed state stays with the
/// caller. Any type implementing the inspector trait for `EthCtx` can be
/// used to observe execution.
pub fn build_eth_evm<'db, DB, I>(db: &'db mut DB, env: &EvmEnv, inspector: I) -> EthEvm<'db, DB, I>
where
    DB: Database,
    I: Inspector<EthCtx<'db, DB>>,
{
    let spec = env.cfg_env.spec;
    let eth_context = EthEvmContext {
        journaled_state: {
            let mut journal = Journal::new(db);
            journal.set_spec_id(spec);
            journal
        },
        block: env.block_env.clone(),
        cfg: env.cfg_env.clone(),
        tx: TxEnv::default(),
        chain: (),
        local: LocalContext::default(),
        error: Ok(()),
    };
    let eth_precompiles = EthPrecompiles {
        precompiles: Precompiles::new(PrecompileSpecId::from_spec_id(spec)),
        spec,
    };

    MainnetEvm::new_with_inspector(
        eth_context,
        inspector,
        EthInstructions::default(),
        eth_precompiles,
    )
}
