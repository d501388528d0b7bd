use proptest::prelude::*;
use xlayer_governance::{
    Address, BisectionManager, BisectionResponse, ChallengeBook, ChallengeEvent, ChallengeState,
    GovernanceError, InMemoryLedger, Participant, ProposalState, ProposalStore, ProtocolConfig,
    U256, VoteDirection, snapshot::build_tree,
};
use xlayer_sumtree::{GlobalIndex, SumTree};

const SNAPSHOT: u64 = 1;
const WINDOW: u64 = 20;
const PROPOSER: Address = Address::repeat_byte(0xaa);
const CHALLENGER: Address = Address::repeat_byte(0xcc);
const BYSTANDER: Address = Address::repeat_byte(0xbb);
const ROOT: GlobalIndex = GlobalIndex::ROOT;

fn proptest_config() -> ProptestConfig {
    let cases = std::env::var("PROPTEST_CASES")
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(64);
    ProptestConfig { cases, ..ProptestConfig::default() }
}

fn index(raw: u64) -> GlobalIndex {
    GlobalIndex::new(raw).unwrap()
}

fn values(raw: &[u64]) -> Vec<U256> {
    raw.iter().copied().map(U256::from).collect()
}

fn config(order: u32) -> ProtocolConfig {
    ProtocolConfig {
        quorum_bps: 2_500,
        voting_delay: 10,
        phase1_period: 100,
        phase2_period: 50,
        execution_grace: 100,
        response_window: WINDOW,
        pollard_order: order,
        proposer_bond: U256::from(1_000u64),
        challenger_bond: U256::from(100u64),
        veto_guardian: None,
    }
}

fn ledger_of(raw: &[u64]) -> InMemoryLedger {
    let participants = raw
        .iter()
        .enumerate()
        .map(|(i, v)| Participant::new(Address::repeat_byte(i as u8 + 1), U256::from(*v)))
        .collect();
    let mut ledger = InMemoryLedger::new();
    ledger.record_snapshot(SNAPSHOT, participants);
    ledger
}

/// Store with one proposal committed to `claimed`
fn setup(raw: &[u64], claimed: &SumTree, order: u32) -> (ProposalStore<InMemoryLedger>, u64) {
    let mut store = ProposalStore::new(config(order), ledger_of(raw)).unwrap();
    let pollard = claimed.generate_pollard(order, ROOT).unwrap();
    let id = store.propose(PROPOSER, "test proposal", vec![0xde, 0xad], SNAPSHOT, pollard, 0).unwrap();
    (store, id)
}

#[test]
fn honest_root_survives_bisection_to_leaf() {
    // three levels: root 1, children 2 and 3, leaves 4..=7
    let raw = [10, 0, 30, 0];
    let tree = build_tree(&ledger_of(&raw), SNAPSHOT).unwrap();
    assert_eq!(tree.root().sum, U256::from(40u64));
    let (mut store, id) = setup(&raw, &tree, 1);

    let (challenge, state) = store.create_challenge(id, CHALLENGER, ROOT, tree.root(), &[], 1).unwrap();
    assert_eq!(state, ChallengeState::AwaitingProposerResponse);

    let pollard = tree.generate_pollard(1, ROOT).unwrap();
    store.respond_to_challenge(id, PROPOSER, challenge, pollard, 2).unwrap();
    let revealed =
        store.proposal(id).unwrap().challenges.get(challenge).unwrap().revealed.clone().unwrap();
    let shown: Vec<u64> = revealed.entries().unwrap().iter().map(|(i, _)| i.get()).collect();
    assert_eq!(shown, vec![2, 3]);

    store.pick_child(id, CHALLENGER, challenge, index(3), 3).unwrap();
    let pollard = tree.generate_pollard(1, index(3)).unwrap();
    store.respond_to_challenge(id, PROPOSER, challenge, pollard, 4).unwrap();
    let state = store.pick_child(id, CHALLENGER, challenge, index(7), 5).unwrap();
    assert_eq!(state, ChallengeState::AwaitingLeafResolution);
    assert_eq!(index(7).depth(), tree.depth());

    assert_eq!(store.defeat_proposal(id, challenge, 6).unwrap(), ChallengeState::ResolvedForProposer);
    assert_eq!(store.state(id, 6).unwrap(), ProposalState::Pending);

    assert!(matches!(
        store.claim_bond_challenger(id, CHALLENGER, &[challenge]),
        Err(GovernanceError::NotClaimable { .. })
    ));
    assert_eq!(store.claim_bond_proposer(id, PROPOSER, &[challenge]).unwrap(), U256::from(100u64));
    assert_eq!(
        store.claim_bond_proposer(id, PROPOSER, &[challenge]),
        Err(GovernanceError::DoubleSettlement { proposal_id: id, challenge: Some(challenge) })
    );
    assert_eq!(store.payouts(&PROPOSER), U256::from(100u64));
}

#[test]
fn forged_leaf_defeats_proposal_and_pays_challenger() {
    let raw = [10, 20, 30, 40];
    let honest = build_tree(&ledger_of(&raw), SNAPSHOT).unwrap();
    let forged = SumTree::build(&values(&[10, 20, 30, 400])).unwrap();
    let mut proposer = BisectionManager::new(forged.clone(), 1, true);
    let mut challenger = BisectionManager::new(honest, 1, false);

    let root_pollard = proposer.respond(ROOT).unwrap();
    let mut store = ProposalStore::new(config(1), ledger_of(&raw)).unwrap();
    let id = store.propose(PROPOSER, "forged", Vec::new(), SNAPSHOT, root_pollard.clone(), 0).unwrap();

    // the forged weight verifies against the forged root
    let proof = forged.prove_leaf(3).unwrap();
    let voter = Address::repeat_byte(4);
    store
        .vote(id, voter, VoteDirection::For, proof.sum, proof.index, proof.witness, 20)
        .unwrap();
    assert_eq!(store.proposal(id).unwrap().votes_for, U256::from(400u64));

    let BisectionResponse::Disagree { pick, theirs, .. } = challenger.process_pollard(&root_pollard).unwrap()
    else {
        panic!("forged root pollard must be disputed");
    };
    assert_eq!(pick, index(3));
    let (challenge, _) = store.create_challenge(id, CHALLENGER, pick, theirs, &[], 21).unwrap();

    let pollard = proposer.respond(pick).unwrap();
    store.respond_to_challenge(id, PROPOSER, challenge, pollard.clone(), 22).unwrap();
    let BisectionResponse::Complete { disputed_leaf, position } = challenger.process_pollard(&pollard).unwrap()
    else {
        panic!("leaf level must complete the bisection");
    };
    assert_eq!(position, 3);
    store.pick_child(id, CHALLENGER, challenge, disputed_leaf, 23).unwrap();

    assert_eq!(store.defeat_proposal(id, challenge, 24).unwrap(), ChallengeState::ResolvedForChallenger);
    assert_eq!(store.state(id, 24).unwrap(), ProposalState::Defeated);
    assert_eq!(store.state(id, 1_000).unwrap(), ProposalState::Defeated);
    assert_eq!(store.proposal(id).unwrap().defeated_by(), Some(challenge));

    // cancelling a defeated proposal changes nothing
    assert_eq!(store.cancel(id, PROPOSER, 25).unwrap(), ProposalState::Defeated);
    assert!(store.reclaim_proposal_bond(id, PROPOSER, 1_000).is_err());

    assert_eq!(store.claim_bond_challenger(id, CHALLENGER, &[challenge]).unwrap(), U256::from(1_100u64));
    assert!(matches!(
        store.claim_bond_challenger(id, CHALLENGER, &[challenge]),
        Err(GovernanceError::DoubleSettlement { .. })
    ));
    assert_eq!(store.payouts(&CHALLENGER), U256::from(1_100u64));
    assert_eq!(store.bonds().escrowed(), U256::ZERO);
}

#[test]
fn depth_three_tree_needs_three_rounds() {
    let raw: Vec<u64> = (1..=8).collect();
    let honest = build_tree(&ledger_of(&raw), SNAPSHOT).unwrap();
    let mut forged_values = raw.clone();
    forged_values[5] += 1;
    let forged = SumTree::build(&values(&forged_values)).unwrap();
    assert_eq!(forged.depth(), 3);

    let (mut store, id) = setup(&raw, &forged, 1);
    let mut proposer = BisectionManager::new(forged.clone(), 1, true);
    let mut challenger = BisectionManager::new(honest, 1, false);

    let (challenge, _) = store.create_challenge(id, CHALLENGER, ROOT, forged.root(), &[], 1).unwrap();
    let mut current = ROOT;
    let mut now = 2;
    let leaf = loop {
        let pollard = proposer.respond(current).unwrap();
        store.respond_to_challenge(id, PROPOSER, challenge, pollard.clone(), now).unwrap();
        now += 1;
        match challenger.process_pollard(&pollard).unwrap() {
            BisectionResponse::Disagree { pick, .. } => {
                store.pick_child(id, CHALLENGER, challenge, pick, now).unwrap();
                current = pick;
            }
            BisectionResponse::Complete { disputed_leaf, .. } => {
                store.pick_child(id, CHALLENGER, challenge, disputed_leaf, now).unwrap();
                break disputed_leaf;
            }
            BisectionResponse::Agree => panic!("forged tree must be disputed"),
        }
        now += 1;
    };

    assert_eq!(leaf, index(13));
    assert_eq!(store.proposal(id).unwrap().challenges.get(challenge).unwrap().rounds, 3);
    assert_eq!(store.defeat_proposal(id, challenge, now).unwrap(), ChallengeState::ResolvedForChallenger);
}

#[test]
fn proposer_silence_forfeits_on_tick() {
    let raw = [1, 2, 3, 4];
    let tree = build_tree(&ledger_of(&raw), SNAPSHOT).unwrap();
    let (mut store, id) = setup(&raw, &tree, 1);
    let (challenge, _) = store.create_challenge(id, CHALLENGER, ROOT, tree.root(), &[], 1).unwrap();

    assert!(store.tick(1 + WINDOW).is_empty());
    let events = store.tick(2 + WINDOW);
    assert_eq!(
        events,
        vec![ChallengeEvent { proposal_id: id, challenge, state: ChallengeState::ResolvedForChallenger }]
    );
    assert_eq!(store.state(id, 2 + WINDOW).unwrap(), ProposalState::Defeated);

    // a late answer cannot revive it
    let pollard = tree.generate_pollard(1, ROOT).unwrap();
    assert!(matches!(
        store.respond_to_challenge(id, PROPOSER, challenge, pollard, 3 + WINDOW),
        Err(GovernanceError::InvalidChallengeState { .. })
    ));
}

#[test]
fn challenger_silence_forfeits_to_proposer() {
    let raw = [1, 2, 3, 4];
    let tree = build_tree(&ledger_of(&raw), SNAPSHOT).unwrap();
    let (mut store, id) = setup(&raw, &tree, 1);
    let (challenge, _) = store.create_challenge(id, CHALLENGER, ROOT, tree.root(), &[], 1).unwrap();
    store.respond_to_challenge(id, PROPOSER, challenge, tree.generate_pollard(1, ROOT).unwrap(), 2).unwrap();

    let err = store.defeat_proposal(id, challenge, 2 + WINDOW).unwrap_err();
    assert!(matches!(err, GovernanceError::InvalidChallengeState { .. }));
    assert_eq!(store.defeat_proposal(id, challenge, 3 + WINDOW).unwrap(), ChallengeState::ResolvedForProposer);
    assert_eq!(store.state(id, 3 + WINDOW).unwrap(), ProposalState::ActivePhase1);
}

#[test]
fn cancelled_proposal_can_still_be_proven_fraudulent() {
    let raw = [10, 20, 30, 40];
    let forged = SumTree::build(&values(&[10, 20, 31, 40])).unwrap();
    let (mut store, id) = setup(&raw, &forged, 1);

    let proof = forged.prove_node(index(6), ROOT).unwrap();
    let (challenge, state) = store.create_challenge(id, CHALLENGER, index(6), proof.node, &proof.witness, 1).unwrap();
    assert_eq!(state, ChallengeState::AwaitingLeafResolution);
    assert_eq!(store.cancel(id, PROPOSER, 2).unwrap(), ProposalState::Cancelled);
    assert!(matches!(
        store.reclaim_proposal_bond(id, PROPOSER, 3),
        Err(GovernanceError::ChallengesPending { open: 1, .. })
    ));

    let events = store.tick(3);
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].state, ChallengeState::ResolvedForChallenger);
    assert_eq!(store.state(id, 3).unwrap(), ProposalState::Defeated);
    assert_eq!(store.claim_bond_challenger(id, CHALLENGER, &[challenge]).unwrap(), U256::from(1_100u64));
}

#[test]
fn unrelated_challenges_are_refunded_after_fraud() {
    let raw = [10, 20, 30, 40];
    let forged = SumTree::build(&values(&[10, 20, 30, 41])).unwrap();
    let (mut store, id) = setup(&raw, &forged, 1);
    let other = Address::repeat_byte(0xdd);

    let (at_root, _) = store.create_challenge(id, other, ROOT, forged.root(), &[], 1).unwrap();
    let proof = forged.prove_node(index(7), ROOT).unwrap();
    let (at_leaf, _) = store.create_challenge(id, CHALLENGER, index(7), proof.node, &proof.witness, 1).unwrap();
    store.defeat_proposal(id, at_leaf, 2).unwrap();

    let book = &store.proposal(id).unwrap().challenges;
    assert_eq!(book.get(at_root).unwrap().state, ChallengeState::Cancelled);
    assert!(matches!(
        store.claim_bond_challenger(id, CHALLENGER, &[at_root]),
        Err(GovernanceError::Unauthorized { .. })
    ));
    assert_eq!(store.claim_bond_challenger(id, other, &[at_root]).unwrap(), U256::from(100u64));
    assert!(matches!(
        store.claim_bond_proposer(id, PROPOSER, &[at_leaf]),
        Err(GovernanceError::NotClaimable { .. })
    ));
}

#[test]
fn abandoned_root_dispute_leaves_forged_branch_open() {
    let raw = [10, 20, 30, 40];
    let forged = SumTree::build(&values(&[10, 20, 30, 400])).unwrap();
    let (mut store, id) = setup(&raw, &forged, 1);

    // a dispute at the root that its opener never follows up
    let (idle, _) = store.create_challenge(id, BYSTANDER, ROOT, forged.root(), &[], 1).unwrap();
    store.respond_to_challenge(id, PROPOSER, idle, forged.generate_pollard(1, ROOT).unwrap(), 2).unwrap();

    let node = *forged.node(index(3)).unwrap();
    let (challenge, _) = store.create_challenge(id, CHALLENGER, index(3), node, &[], 3).unwrap();

    let events = store.tick(3 + WINDOW);
    assert_eq!(
        events,
        vec![ChallengeEvent { proposal_id: id, challenge: idle, state: ChallengeState::ResolvedForProposer }]
    );
    let book = &store.proposal(id).unwrap().challenges;
    assert_eq!(book.get(challenge).unwrap().state, ChallengeState::AwaitingProposerResponse);

    // the forged branch is still disputable by anyone
    let (second, _) = store.create_challenge(id, BYSTANDER, index(3), node, &[], 4).unwrap();
    assert_ne!(second, challenge);

    let pollard = forged.generate_pollard(1, index(3)).unwrap();
    store.respond_to_challenge(id, PROPOSER, challenge, pollard, 3 + WINDOW).unwrap();
    store.pick_child(id, CHALLENGER, challenge, index(7), 4 + WINDOW).unwrap();
    assert_eq!(store.defeat_proposal(id, challenge, 5 + WINDOW).unwrap(), ChallengeState::ResolvedForChallenger);
    assert_eq!(store.state(id, 200).unwrap(), ProposalState::Defeated);

    let book = &store.proposal(id).unwrap().challenges;
    assert_eq!(book.get(second).unwrap().state, ChallengeState::Cancelled);
    assert_eq!(store.claim_bond_challenger(id, CHALLENGER, &[challenge]).unwrap(), U256::from(1_100u64));
}

#[test]
fn batch_claims_are_atomic() {
    let raw = [1, 2, 3, 4];
    let tree = build_tree(&ledger_of(&raw), SNAPSHOT).unwrap();
    let (mut store, id) = setup(&raw, &tree, 1);
    let opened: Vec<u64> = [4, 5]
        .into_iter()
        .map(|leaf| {
            let proof = tree.prove_node(index(leaf), ROOT).unwrap();
            store.create_challenge(id, CHALLENGER, index(leaf), proof.node, &proof.witness, 1).unwrap().0
        })
        .collect();
    store.tick(2);

    // no challenge 99, so nothing in the batch is paid
    let err = store.claim_bond_proposer(id, PROPOSER, &[opened[0], 99]).unwrap_err();
    assert_eq!(err, GovernanceError::ChallengeNotFound(99));
    assert_eq!(store.payouts(&PROPOSER), U256::ZERO);

    let err = store.claim_bond_proposer(id, PROPOSER, &[opened[0], opened[0]]).unwrap_err();
    assert!(matches!(err, GovernanceError::DoubleSettlement { .. }));

    let paid = store.claim_bond_proposer(id, PROPOSER, &opened).unwrap();
    assert_eq!(paid, U256::from(200u64));
    assert_eq!(store.payouts(&PROPOSER), U256::from(200u64));
}

proptest! {
    #![proptest_config(proptest_config())]
    #[test]
    fn bisection_terminates_within_depth(
        raw in prop::collection::vec(any::<u32>(), 1..64),
        order in 1u32..4,
        picks in prop::collection::vec(any::<usize>(), 64),
    ) {
        let leaves: Vec<U256> = raw.iter().copied().map(U256::from).collect();
        let tree = SumTree::build(&leaves).unwrap();
        let mut book = ChallengeBook::new(tree.depth(), order, WINDOW, tree.root());
        let (challenge, mut state) = book.open(CHALLENGER, U256::ZERO, ROOT, tree.root(), &[], 0).unwrap();

        let mut rounds = 0usize;
        while state == ChallengeState::AwaitingProposerResponse {
            let disputed = book.get(challenge).unwrap().index;
            let pollard = tree.generate_pollard(order, disputed).unwrap();
            book.respond(challenge, pollard.clone(), 0).unwrap();
            let entries = pollard.entries().unwrap();
            let (child, _) = entries[picks[rounds] % entries.len()];
            rounds += 1;
            state = book.pick(challenge, CHALLENGER, child, 0).unwrap();
        }

        prop_assert_eq!(state, ChallengeState::AwaitingLeafResolution);
        prop_assert!(rounds as u32 <= tree.depth());
        prop_assert_eq!(book.get(challenge).unwrap().rounds as usize, rounds);

        let leaf = book.get(challenge).unwrap().index;
        let position = leaf.leaf_position(tree.depth()).unwrap() as usize;
        let canonical = leaves.get(position).copied().unwrap_or(U256::ZERO);
        prop_assert_eq!(book.resolve_leaf(challenge, canonical).unwrap(), ChallengeState::ResolvedForProposer);
    }
}
