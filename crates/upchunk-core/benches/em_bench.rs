use criterion::{Criterion, black_box, criterion_group, criterion_main};
use upchunk_core::{
    EncoderType, ModelKind, SequenceModel, StopSegmentCorpus, TagEncoder, ViterbiDecoder,
    Vocabulary, em_iteration,
};

fn corpus(vocab: &mut Vocabulary) -> StopSegmentCorpus {
    let lines = [
        "the quick brown fox jumped over the lazy dog",
        "on sunday , the grizzly bear sleeps",
        "the lazy dog sleeps , the fox jumped",
        "on monday the quick bear jumped over the dog",
        "the grizzly fox sleeps in the brown den",
    ];
    let sentences = lines
        .iter()
        .cycle()
        .take(200)
        .map(|line| {
            line.split(" , ")
                .map(|seg| seg.split_whitespace().map(|w| vocab.code(w)).collect())
                .collect()
        })
        .collect();
    StopSegmentCorpus::new(sentences)
}

fn bench_em(c: &mut Criterion) {
    let mut vocab = Vocabulary::new();
    let corpus = corpus(&mut vocab);
    let tokens = corpus.flatten();

    for (name, kind, model) in [
        ("em_iteration_hmm_bio", EncoderType::Bio, ModelKind::Hmm),
        ("em_iteration_rrg_bio", EncoderType::Bio, ModelKind::Rrg),
        ("em_iteration_hmm_gp", EncoderType::BioGp, ModelKind::Hmm),
    ] {
        let encoder = TagEncoder::new(kind).unwrap();
        let counts = encoder.soft_counts(&tokens, vocab.len()).unwrap();
        let initial = SequenceModel::from_counts(model, &counts, &encoder, 0.1).unwrap();
        c.bench_function(name, |b| {
            b.iter(|| em_iteration(black_box(&initial), black_box(&tokens)).unwrap());
        });
    }
}

fn bench_viterbi(c: &mut Criterion) {
    let mut vocab = Vocabulary::new();
    let corpus = corpus(&mut vocab);
    let tokens = corpus.flatten();
    let encoder = TagEncoder::new(EncoderType::Bio).unwrap();
    let counts = encoder.soft_counts(&tokens, vocab.len()).unwrap();
    let model = SequenceModel::from_counts(ModelKind::Hmm, &counts, &encoder, 0.1).unwrap();
    let decoder = ViterbiDecoder::new();

    c.bench_function("viterbi_decode_hmm_bio", |b| {
        b.iter(|| decoder.decode(black_box(&model), black_box(&tokens)).unwrap());
    });
}

criterion_group!(benches, bench_em, bench_viterbi);
criterion_main!(benches);
