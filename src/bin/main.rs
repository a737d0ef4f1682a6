// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2025 Daniel Negri
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

use clap::{Args as ClapArgs, Parser, Subcommand};
use serde::Serialize;
use sorosave_sdk::amount::{DEFAULT_SCALE, from_display};
use sorosave_sdk::notify::{Relay, TelegramBot};
use sorosave_sdk::{
    Address, CreateGroupParams, GroupId, SoroSaveClient, SoroSaveConfig, SorosaveError,
    StatusPolicy, TESTNET_PASSPHRASE, TESTNET_RPC_URL, UnsignedTransaction,
};
use std::process;
use tracing::info;
use tracing_subscriber::EnvFilter;

/// SoroSave - savings group contract client
///
/// Queries print decoded records as JSON. Group operations print the
/// simulated, fee-assembled transaction: its base64 envelope XDR and the
/// hash to sign. Sign and submit it with your wallet.
#[derive(Parser, Debug)]
#[command(name = "sorosave")]
#[command(about = "Build and query SoroSave contract calls", long_about = None)]
struct Args {
    /// Contract id (C...) of the deployed savings contract
    #[arg(long, env = "SOROSAVE_CONTRACT_ID")]
    contract_id: Option<String>,

    /// Ledger RPC endpoint
    #[arg(long, env = "SOROSAVE_RPC_URL", default_value = TESTNET_RPC_URL)]
    rpc_url: String,

    /// Network passphrase the envelope is bound to
    #[arg(long, env = "SOROSAVE_NETWORK_PASSPHRASE", default_value = TESTNET_PASSPHRASE)]
    network_passphrase: String,

    /// Decode unrecognized group statuses as Forming
    #[arg(long)]
    lenient_status: bool,

    #[command(subcommand)]
    command: Command,
}

/// An `(address, group)` call, signed by `--source` or the address itself.
#[derive(ClapArgs, Debug)]
struct MemberCall {
    address: String,
    group_id: u64,
    /// Account that will sign the transaction (defaults to ADDRESS)
    #[arg(long)]
    source: Option<String>,
}

impl MemberCall {
    fn parts(&self) -> (Address, GroupId, Address) {
        let address = Address::from(self.address.as_str());
        let source = self.source.as_deref().map_or_else(|| address.clone(), Address::from);
        (address, GroupId(self.group_id), source)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    #[command(flatten)]
    Contract(ContractCommand),
    /// Run the Telegram notification bot until interrupted
    Bot {
        #[arg(long, env = "TELEGRAM_BOT_TOKEN", hide_env_values = true)]
        token: String,
    },
}

#[derive(Subcommand, Debug)]
enum ContractCommand {
    /// Show a group
    GetGroup { group_id: u64 },
    /// Show one round of a group
    GetRound { group_id: u64, round: u32 },
    /// List groups a member belongs to
    MemberGroups { member: String },
    /// Show the payout rotation of a group
    PayoutOrder { group_id: u64 },
    /// Show who receives the current round's pot
    CurrentRecipient { group_id: u64 },
    /// Check whether a member paid into a round
    HasContributed {
        member: String,
        group_id: u64,
        round: u32,
    },
    /// Create a group; AMOUNT is in display units, e.g. 10.5
    CreateGroup {
        #[arg(long)]
        admin: String,
        #[arg(long)]
        name: String,
        #[arg(long)]
        token: String,
        #[arg(long)]
        amount: String,
        /// Seconds per round
        #[arg(long)]
        cycle_length: u64,
        #[arg(long)]
        max_members: u32,
        #[arg(long, default_value_t = DEFAULT_SCALE)]
        decimals: u32,
        #[arg(long)]
        source: Option<String>,
    },
    Join(MemberCall),
    Leave(MemberCall),
    Start(MemberCall),
    Contribute(MemberCall),
    Pause(MemberCall),
    Resume(MemberCall),
    /// Pay the pot to the current recipient
    Payout {
        group_id: u64,
        #[arg(long)]
        source: String,
    },
    /// Raise a dispute on a group
    Dispute {
        #[command(flatten)]
        call: MemberCall,
        #[arg(long)]
        reason: String,
    },
    /// Resolve a group's open dispute (admin)
    ResolveDispute(MemberCall),
    /// Return remaining funds to members (admin)
    EmergencyWithdraw(MemberCall),
    /// Hand group administration to another account
    SetAdmin {
        #[command(flatten)]
        call: MemberCall,
        #[arg(long)]
        new_admin: String,
    },
}

/// JSON view of an unsigned transaction.
#[derive(Serialize)]
struct TransactionOutput {
    function: Option<String>,
    source: Address,
    fee: u32,
    seq_num: i64,
    max_time: Option<u64>,
    /// Hex SHA-256 payload hash to sign.
    hash: String,
    /// Base64 `TransactionEnvelope`.
    xdr: String,
}

impl TransactionOutput {
    fn new(transaction: &UnsignedTransaction) -> Result<Self, SorosaveError> {
        Ok(Self {
            function: transaction.function(),
            source: transaction.source_account(),
            fee: transaction.fee(),
            seq_num: transaction.seq_num(),
            max_time: transaction.max_time(),
            hash: transaction.hash_hex()?,
            xdr: transaction.to_xdr_base64()?,
        })
    }
}

#[derive(Debug, thiserror::Error)]
enum CliError {
    #[error(transparent)]
    Sdk(#[from] SorosaveError),
    #[error("cannot render output: {0}")]
    Output(#[from] serde_json::Error),
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    if let Err(e) = run(args).await {
        eprintln!("Error: {e}");
        if let CliError::Sdk(sdk) = &e {
            if let Some(code) = sdk.contract_error() {
                eprintln!("Contract error: {code:?} (#{})", code.code());
            }
        }
        process::exit(1);
    }
}

async fn run(args: Args) -> Result<(), CliError> {
    let command = match args.command {
        Command::Bot { token } => return run_bot(&token).await,
        Command::Contract(command) => command,
    };

    let config = SoroSaveConfig::new(
        args.contract_id.unwrap_or_default(),
        args.rpc_url,
        args.network_passphrase,
    );
    let policy = if args.lenient_status {
        StatusPolicy::FallbackToForming
    } else {
        StatusPolicy::Preserve
    };
    let client = SoroSaveClient::new(config)?.with_status_policy(policy);

    match command {
        ContractCommand::GetGroup { group_id } => {
            print_json(&client.get_group(GroupId(group_id)).await?)
        }
        ContractCommand::GetRound { group_id, round } => {
            print_json(&client.get_round_status(GroupId(group_id), round).await?)
        }
        ContractCommand::MemberGroups { member } => {
            print_json(&client.get_member_groups(&member.into()).await?)
        }
        ContractCommand::PayoutOrder { group_id } => {
            print_json(&client.get_payout_order(GroupId(group_id)).await?)
        }
        ContractCommand::CurrentRecipient { group_id } => {
            print_json(&client.get_current_recipient(GroupId(group_id)).await?)
        }
        ContractCommand::HasContributed {
            member,
            group_id,
            round,
        } => print_json(
            &client
                .has_contributed(&member.into(), GroupId(group_id), round)
                .await?,
        ),
        ContractCommand::CreateGroup {
            admin,
            name,
            token,
            amount,
            cycle_length,
            max_members,
            decimals,
            source,
        } => {
            let params = CreateGroupParams {
                admin: admin.into(),
                name,
                token: token.into(),
                contribution_amount: from_display(&amount, decimals)?,
                cycle_length,
                max_members,
            };
            let source = source.map_or_else(|| params.admin.clone(), Address::from);
            print_transaction(&client.create_group(&params, &source).await?)
        }
        ContractCommand::Join(call) => {
            let (member, group, source) = call.parts();
            print_transaction(&client.join_group(&member, group, &source).await?)
        }
        ContractCommand::Leave(call) => {
            let (member, group, source) = call.parts();
            print_transaction(&client.leave_group(&member, group, &source).await?)
        }
        ContractCommand::Start(call) => {
            let (admin, group, source) = call.parts();
            print_transaction(&client.start_group(&admin, group, &source).await?)
        }
        ContractCommand::Contribute(call) => {
            let (member, group, source) = call.parts();
            print_transaction(&client.contribute(&member, group, &source).await?)
        }
        ContractCommand::Pause(call) => {
            let (admin, group, source) = call.parts();
            print_transaction(&client.pause_group(&admin, group, &source).await?)
        }
        ContractCommand::Resume(call) => {
            let (admin, group, source) = call.parts();
            print_transaction(&client.resume_group(&admin, group, &source).await?)
        }
        ContractCommand::Payout { group_id, source } => {
            print_transaction(&client.distribute_payout(GroupId(group_id), &source.into()).await?)
        }
        ContractCommand::Dispute { call, reason } => {
            let (member, group, source) = call.parts();
            print_transaction(&client.raise_dispute(&member, group, &reason, &source).await?)
        }
        ContractCommand::ResolveDispute(call) => {
            let (admin, group, source) = call.parts();
            print_transaction(&client.resolve_dispute(&admin, group, &source).await?)
        }
        ContractCommand::EmergencyWithdraw(call) => {
            let (admin, group, source) = call.parts();
            print_transaction(&client.emergency_withdraw(&admin, group, &source).await?)
        }
        ContractCommand::SetAdmin { call, new_admin } => {
            let (admin, group, source) = call.parts();
            let new_admin = Address::from(new_admin);
            print_transaction(&client.set_group_admin(&admin, group, &new_admin, &source).await?)
        }
    }
}

async fn run_bot(token: &str) -> Result<(), CliError> {
    let bot = TelegramBot::new(token)?;
    let me = bot.get_me().await?;
    info!(
        id = me.id,
        username = me.username.as_deref().unwrap_or(&me.first_name),
        "bot started"
    );

    let relay = Relay::new(bot);
    tokio::select! {
        () = relay.run() => {}
        _ = tokio::signal::ctrl_c() => info!("shutting down"),
    }
    Ok(())
}

fn print_json<T: Serialize>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_transaction(transaction: &UnsignedTransaction) -> Result<(), CliError> {
    print_json(&TransactionOutput::new(transaction)?)
}
