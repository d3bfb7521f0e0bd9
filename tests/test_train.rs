#[cfg(test)]
mod tests {
    use block_vq::{
        block::partition, distance::l2_distance, kmeans::KMeans, quantize, train, Codebook,
        EncodingError, PixelMatrix, Purpose, QuantizerParameters, TrainingParameters,
        TrainingState, VectorQuantizer,
    };
    use rand::{Rng, SeedableRng};

    const IMAGE_SIZE: usize = 64;
    const BLOCK_SIZE: usize = 4;
    const CODEBOOK_SIZE: usize = 16;

    /// Image made of a few flat regions with noise on top.
    fn clustered_image(rng: &mut impl Rng) -> PixelMatrix<u8> {
        let levels = [20u8, 70, 130, 200, 240];
        let data = (0..IMAGE_SIZE * IMAGE_SIZE)
            .map(|i| {
                let (row, col) = (i / IMAGE_SIZE, i % IMAGE_SIZE);
                let level = levels[(row / 16 + col / 8) % levels.len()];
                level.saturating_add(rng.gen_range(0..15))
            })
            .collect();
        PixelMatrix::new(IMAGE_SIZE, data).unwrap()
    }

    fn parameters() -> QuantizerParameters {
        QuantizerParameters {
            intensity_bit: 8,
            block_size: BLOCK_SIZE,
            image_size: IMAGE_SIZE,
            codebook_size: CODEBOOK_SIZE,
        }
    }

    #[test]
    fn test_all_zero_image() {
        let image = PixelMatrix::<u8>::zeros(4);
        let parameters = QuantizerParameters {
            intensity_bit: 8,
            block_size: 2,
            image_size: 4,
            codebook_size: 1,
        };
        let codebook = train(
            std::slice::from_ref(&image),
            &parameters,
            &TrainingParameters::default(),
        )
        .unwrap();
        assert_eq!(codebook.len(), 1);
        assert_eq!(codebook.get(0), &[0.0; 4]);

        let quantized = quantize(&image, &codebook, 8).unwrap();
        let metrics = quantized.metrics();
        assert_eq!(metrics.mse, 0.0);
        assert_eq!(metrics.psnr, f64::INFINITY);
        assert_eq!(metrics.entropy, 0.0);
    }

    #[test]
    fn test_two_patterns() {
        let pattern_a = [10u8, 20, 30, 40];
        let pattern_b = [200u8, 180, 160, 140];
        // 8x8 image, blocks alternate like a checkerboard: 8 of each pattern
        let mut image = PixelMatrix::<u8>::zeros(8);
        for i in 0..8 {
            for j in 0..8 {
                let pattern = if (i / 2 + j / 2) % 2 == 0 {
                    &pattern_a
                } else {
                    &pattern_b
                };
                image.set(i, j, pattern[(i % 2) * 2 + j % 2]);
            }
        }
        let parameters = QuantizerParameters {
            intensity_bit: 8,
            block_size: 2,
            image_size: 8,
            codebook_size: 2,
        };
        let training = TrainingParameters {
            eps: 1e-6,
            ..Default::default()
        };

        let mut quantizer = VectorQuantizer::new(parameters).unwrap();
        quantizer.load_image(&image, Purpose::Train).unwrap();
        let summary = quantizer.train(&training, || false).unwrap().clone();
        assert!(summary.converged);
        assert_eq!(summary.mse, 0.0);
        assert_eq!(summary.reseeded, 0);

        let codebook = quantizer.codebook().unwrap();
        let as_f32 = |p: &[u8; 4]| p.iter().map(|&v| v as f32).collect::<Vec<_>>();
        // the brighter pattern has the larger norm and is picked first
        assert_eq!(codebook.get(0), as_f32(&pattern_b).as_slice());
        assert_eq!(codebook.get(1), as_f32(&pattern_a).as_slice());
        assert!(quantizer.distances_to_centroids().iter().all(|&d| d == 0.0));

        let quantized = quantizer.quantize(&image).unwrap();
        assert_eq!(quantized.metrics().mse, 0.0);
        assert_eq!(quantized.metrics().psnr, f64::INFINITY);
        assert_eq!(quantized.metrics().entropy, 1.0);
        assert_eq!(quantized.metrics().codeword_frequency, vec![0.5, 0.5]);
        assert_eq!(quantized.reconstruct::<u8>().unwrap(), image);
    }

    #[test]
    fn test_mse_is_non_increasing() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let image = clustered_image(&mut rng);
        let mut blocks = partition(&image, BLOCK_SIZE, 8).unwrap();

        let training = TrainingParameters {
            eps: 1e-9,
            max_iterations: 50,
        };
        let kmeans = KMeans::run(&mut blocks, BLOCK_SIZE, CODEBOOK_SIZE, &training, || false)
            .unwrap();

        assert!(kmeans.mse_history.len() >= 2);
        for window in kmeans.mse_history.windows(2) {
            assert!(
                window[1] <= window[0] * (1.0 + 1e-6) + 1e-9,
                "MSE increased: {:?}",
                kmeans.mse_history
            );
        }
        assert!(kmeans.codebook.iter().flatten().all(|v| v.is_finite()));
    }

    #[test]
    fn test_assignment_is_optimal() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let image = clustered_image(&mut rng);
        let mut blocks = partition(&image, BLOCK_SIZE, 8).unwrap();

        let kmeans = KMeans::run(
            &mut blocks,
            BLOCK_SIZE,
            CODEBOOK_SIZE,
            &TrainingParameters::default(),
            || false,
        )
        .unwrap();

        for (block, &distance) in blocks.iter().zip(kmeans.dist2cent.iter()) {
            let assigned = kmeans.codebook.get(block.cluster_index);
            assert!((l2_distance(&block.block, assigned) - distance).abs() < 1e-3);
            for codeword in kmeans.codebook.iter() {
                assert!(distance <= l2_distance(&block.block, codeword) + 1e-3);
            }
        }
    }

    #[test]
    fn test_iteration_limit() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let image = clustered_image(&mut rng);
        let mut blocks = partition(&image, BLOCK_SIZE, 8).unwrap();

        let training = TrainingParameters {
            eps: 1e-12,
            max_iterations: 1,
        };
        let kmeans = KMeans::run(&mut blocks, BLOCK_SIZE, CODEBOOK_SIZE, &training, || false)
            .unwrap();
        let summary = kmeans.summary();
        assert_eq!(summary.iterations, 1);
        assert_eq!(kmeans.mse_history.len(), 2);
        if !summary.converged {
            assert_eq!(kmeans.state, TrainingState::Refining);
        }
    }

    #[test]
    fn test_more_codewords_than_distinct_blocks() {
        let image = PixelMatrix::new(4, vec![0u8, 0, 9, 9, 0, 0, 9, 9, 5, 5, 0, 0, 5, 5, 0, 0])
            .unwrap();
        let parameters = QuantizerParameters {
            intensity_bit: 8,
            block_size: 2,
            image_size: 4,
            codebook_size: 4,
        };
        let codebook = train(
            std::slice::from_ref(&image),
            &parameters,
            &TrainingParameters::default(),
        )
        .unwrap();
        assert_eq!(codebook.len(), 4);
        assert!(codebook.iter().flatten().all(|v| v.is_finite()));

        let quantized = quantize(&image, &codebook, 8).unwrap();
        assert_eq!(quantized.metrics().mse, 0.0);
        assert_eq!(quantized.reconstruct::<u8>().unwrap(), image);
    }

    #[test]
    fn test_training_blocks_accumulate() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let parameters = parameters();
        let blocks_per_image = parameters.blocks_per_image();
        let mut quantizer = VectorQuantizer::new(parameters).unwrap();

        for _ in 0..3 {
            quantizer
                .load_image(&clustered_image(&mut rng), Purpose::Train)
                .unwrap();
        }
        assert_eq!(quantizer.training_blocks().len(), 3 * blocks_per_image);

        quantizer
            .load_image(&clustered_image(&mut rng), Purpose::Quantize)
            .unwrap();
        quantizer
            .load_image(&clustered_image(&mut rng), Purpose::Quantize)
            .unwrap();
        assert_eq!(quantizer.quantize_blocks().len(), blocks_per_image);

        let summary = quantizer
            .train(&TrainingParameters::default(), || false)
            .unwrap();
        assert!(summary.iterations >= 1);
        assert_eq!(
            quantizer.distances_to_centroids().len(),
            3 * blocks_per_image
        );
        assert_eq!(quantizer.codebook().unwrap().len(), CODEBOOK_SIZE);

        quantizer.clear_training_blocks();
        assert!(quantizer.training_blocks().is_empty());
        assert!(quantizer.codebook().is_some());
    }

    #[test]
    fn test_session_errors() {
        assert!(matches!(
            VectorQuantizer::new(QuantizerParameters {
                image_size: 30,
                ..parameters()
            }),
            Err(EncodingError::InvalidParameters(_))
        ));

        let mut quantizer = VectorQuantizer::new(parameters()).unwrap();
        assert_eq!(
            quantizer.load_image(&PixelMatrix::<u8>::zeros(32), Purpose::Train),
            Err(EncodingError::ImageSizeMismatch {
                expected: IMAGE_SIZE,
                actual: 32
            })
        );
        assert_eq!(
            quantizer
                .train(&TrainingParameters::default(), || false)
                .map(|s| s.clone()),
            Err(EncodingError::EmptyTrainingSet)
        );
        assert!(matches!(
            quantizer.quantize(&PixelMatrix::<u8>::zeros(IMAGE_SIZE)),
            Err(EncodingError::NotTrained)
        ));

        quantizer
            .load_image(&PixelMatrix::<u8>::zeros(IMAGE_SIZE), Purpose::Train)
            .unwrap();
        let zero_eps = TrainingParameters {
            eps: 0.0,
            ..Default::default()
        };
        assert!(matches!(
            quantizer.train(&zero_eps, || false),
            Err(EncodingError::InvalidParameters(_))
        ));
        assert!(matches!(
            quantizer.train(&TrainingParameters::default(), || true),
            Err(EncodingError::Stopped)
        ));

        let too_bright =
            PixelMatrix::new(IMAGE_SIZE, vec![300u16; IMAGE_SIZE * IMAGE_SIZE]).unwrap();
        assert!(matches!(
            quantizer.load_image(&too_bright, Purpose::Train),
            Err(EncodingError::IntensityOutOfRange { value: 300, max: 255 })
        ));
    }

    #[test]
    fn test_failed_training_keeps_previous_state() {
        let mut rng = rand::rngs::StdRng::seed_from_u64(42);
        let mut quantizer = VectorQuantizer::new(parameters()).unwrap();
        quantizer
            .load_image(&clustered_image(&mut rng), Purpose::Train)
            .unwrap();
        quantizer
            .train(&TrainingParameters::default(), || false)
            .unwrap();

        let blocks = quantizer.training_blocks().to_vec();
        let distances = quantizer.distances_to_centroids().to_vec();
        let codebook = quantizer.codebook().cloned();
        let summary = quantizer.summary().cloned();

        // seeding relabels the blocks before the stop request is seen
        assert!(matches!(
            quantizer.train(&TrainingParameters::default(), || true),
            Err(EncodingError::Stopped)
        ));

        assert_eq!(quantizer.training_blocks(), blocks.as_slice());
        assert_eq!(quantizer.distances_to_centroids(), distances.as_slice());
        assert_eq!(quantizer.codebook().cloned(), codebook);
        assert_eq!(quantizer.summary().cloned(), summary);
    }

    #[test]
    fn test_with_codebook() {
        let codewords = vec![vec![0.0; BLOCK_SIZE * BLOCK_SIZE]; 2];
        let codebook = Codebook::new(BLOCK_SIZE, codewords).unwrap();
        assert!(VectorQuantizer::with_codebook(parameters(), codebook.clone()).is_err());

        let parameters = QuantizerParameters {
            codebook_size: 2,
            ..parameters()
        };
        let mut quantizer = VectorQuantizer::with_codebook(parameters, codebook).unwrap();
        let quantized = quantizer
            .quantize(&PixelMatrix::<u8>::zeros(IMAGE_SIZE))
            .unwrap();
        assert_eq!(quantized.metrics().mse, 0.0);
        assert!(quantized.indexes().iter().all(|&i| i == 0));
    }
}
